// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives – requests, responses, errors and the request pipeline.
//!
//! No socket handling lives here; that sits in `server` (IO).  Every
//! inbound request is processed independently: the only shared state is
//! the read-only configuration baked into [`ProxyCore`] at startup.


use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::classifier::{classify, Disposition};
use crate::config::Settings;
use crate::cors::CorsConfig;
use crate::credentials::{CredentialBroker, CredentialProvider, HttpCredentialProvider};
use crate::framing;
use crate::router::{Route, RouteDispatcher};
use crate::upstream::{OriginResponse, UpstreamClient};
use crate::{debug_fmt, error_fmt, info_fmt, warn_fmt};

/// Body of the error returned when the origin cannot be reached.
pub const ORIGIN_UNREACHABLE_MESSAGE: &str = "Failed to connect to Synapse";

/// Errors that can occur during proxy operations.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The origin refused the connection or it broke before a response head.
    #[error("origin unreachable: {0}")]
    OriginUnreachable(#[source] reqwest::Error),

    /// The origin did not answer in time.
    #[error("origin timed out after {0:?}")]
    OriginTimeout(Duration),

    #[error("routing error: {0}")]
    RoutingError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<crate::config::ConfigError> for ProxyError {
    fn from(err: crate::config::ConfigError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

impl ProxyError {
    /// HTTP status reported to the client for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::OriginUnreachable(_) | ProxyError::OriginTimeout(_) => 502,
            _ => 500,
        }
    }

    /// Message placed in the `error` field of the JSON error body.
    pub fn client_message(&self) -> &'static str {
        match self {
            ProxyError::OriginUnreachable(_) | ProxyError::OriginTimeout(_) => {
                ORIGIN_UNREACHABLE_MESSAGE
            }
            _ => "Internal Server Error",
        }
    }
}

/// Per-request data used for logging.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Short id tying together the log lines of one request.
    pub request_id: String,
    /// First `X-Forwarded-For` entry, else the peer address.
    pub client_ip: String,
    pub start_time: Instant,
}

impl RequestContext {
    pub fn new(peer_ip: &str, headers: &HeaderMap) -> Self {
        Self {
            request_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            client_ip: client_ip(peer_ip, headers),
            start_time: Instant::now(),
        }
    }
}

/// Resolve the address to log for a request.
pub fn client_ip(peer_ip: &str, headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(peer_ip)
        .to_string()
}

/// An inbound request, immutable once received.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string, without the `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// `None` when the client sent no body.
    pub body: Option<reqwest::Body>,
    pub context: RequestContext,
}

/// The response written back to the client.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: reqwest::Body,
}

impl ProxyResponse {
    /// Relay an origin response, streaming its body as it arrives.
    pub fn relay(origin: OriginResponse) -> Self {
        Self {
            status: origin.status,
            headers: framing::streamed(origin.headers),
            body: reqwest::Body::wrap_stream(origin.body),
        }
    }

    /// A fully buffered body under the origin's headers.
    pub fn fixed(status: u16, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: framing::fixed_length(headers, &body),
            body: reqwest::Body::from(body),
        }
    }

    /// Substitute credentials for the origin body, keeping its headers.
    /// The new body is never compressed, so any `Content-Encoding` goes.
    pub fn substituted(mut origin_headers: HeaderMap, body: Bytes) -> Self {
        origin_headers.remove(CONTENT_ENCODING);
        let mut response = Self::fixed(200, origin_headers, body);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// JSON error body for a failed request.
    pub fn error(err: &ProxyError) -> Self {
        let body = Bytes::from(json!({ "error": err.client_message() }).to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::fixed(err.status_code(), headers, body)
    }
}

/// The request pipeline.
#[derive(Debug)]
pub struct ProxyCore {
    dispatcher: RouteDispatcher,
    origin: UpstreamClient,
    broker: CredentialBroker,
    cors: CorsConfig,
}

impl ProxyCore {
    /// Build the pipeline with the HTTP credential provider.
    pub fn new(settings: &Settings) -> Result<Self, ProxyError> {
        let provider = HttpCredentialProvider::new(&settings.provider)?;
        Self::with_provider(settings, Arc::new(provider))
    }

    /// Build the pipeline around a custom credential provider.
    pub fn with_provider(
        settings: &Settings,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ProxyError> {
        Ok(Self {
            dispatcher: RouteDispatcher::new()?,
            origin: UpstreamClient::new(&settings.origin)?,
            broker: CredentialBroker::new(provider, settings.provider.ttl),
            cors: settings.cors.clone(),
        })
    }

    /// Process one request.  Never fails: errors become JSON error responses.
    pub async fn process_request(&self, request: ProxyRequest) -> ProxyResponse {
        let context = request.context.clone();
        let method = request.method.clone();
        let path = request.path.clone();
        let cors_origin = self.cors.request_origin(&request.headers);

        /* ---------- CORS preflight ---------- */
        if let Some(origin) = cors_origin
            .as_ref()
            .filter(|_| self.cors.is_preflight(&method, &request.headers))
        {
            debug_fmt!("Cors", "{} answering preflight for {}", context.request_id, path);
            let headers = self.cors.preflight_headers(origin, &request.headers);
            return ProxyResponse::fixed(200, headers, Bytes::new());
        }

        /* ---------- dispatch ---------- */
        let route = self.dispatcher.dispatch(&method, &path);
        let result = match &route {
            Route::TurnServer { prefix } => self.turn_server(request, prefix).await,
            Route::Forward => self.forward(request).await,
        };

        let (mut response, upstream_elapsed) = match result {
            Ok(ok) => ok,
            Err(e) => {
                error_fmt!(
                    "Proxy",
                    "{} -- {} {} failed: {}",
                    context.client_ip,
                    method,
                    path,
                    e
                );
                (ProxyResponse::error(&e), Duration::ZERO)
            }
        };

        if let Some(origin) = cors_origin {
            self.cors.decorate(&origin, &mut response.headers);
        }

        /* ---------- timing log ---------- */
        let total = context.start_time.elapsed();
        debug_fmt!(
            "Timing",
            "{} {} {} [{}] -> {} | total={:?} upstream={:?} internal={:?}",
            context.request_id,
            method,
            path,
            route.name(),
            response.status,
            total,
            upstream_elapsed,
            total.saturating_sub(upstream_elapsed)
        );

        response
    }

    /// Credential route: substitute on an authenticated 200, relay otherwise.
    async fn turn_server(
        &self,
        request: ProxyRequest,
        prefix: &str,
    ) -> Result<(ProxyResponse, Duration), ProxyError> {
        let context = request.context.clone();
        let path = request.path.clone();
        debug_fmt!("TurnServer", "{} credential request under /{}", context.request_id, prefix);

        let origin = self.origin.forward_bounded(request).await?;
        let mut upstream_elapsed = origin.elapsed;
        info_fmt!("TurnServer", "{} -- {} -- {}", context.client_ip, origin.status, path);

        if classify(origin.status) == Disposition::PassThrough {
            return Ok((ProxyResponse::relay(origin), upstream_elapsed));
        }

        let provider_start = Instant::now();
        let minted = self.broker.substitute_body().await;
        upstream_elapsed += provider_start.elapsed();

        match minted {
            Ok(body) => {
                debug_fmt!(
                    "TurnServer",
                    "{} substituted {} byte credential body from '{}' provider",
                    context.request_id,
                    body.len(),
                    self.broker.provider_name()
                );
                Ok((ProxyResponse::substituted(origin.headers, body), upstream_elapsed))
            }
            Err(e) => {
                error_fmt!(
                    "TurnServer",
                    "{} -- Failed to fetch TURN credentials: {}; relaying origin response",
                    context.client_ip,
                    e
                );
                Ok((ProxyResponse::relay(origin), upstream_elapsed))
            }
        }
    }

    /// Default route: forward untouched and stream the answer back.
    async fn forward(&self, request: ProxyRequest) -> Result<(ProxyResponse, Duration), ProxyError> {
        warn_fmt!(
            "Forward",
            "{} -- Unexpected request: {} {}, forwarding to origin",
            request.context.client_ip,
            request.method,
            request.path
        );

        let origin = self.origin.forward(request).await?;
        let elapsed = origin.elapsed;
        Ok((ProxyResponse::relay(origin), elapsed))
    }
}
