// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound calls to the origin homeserver.
//!
//! The response body is handed back as a lazy stream of chunks, so the
//! caller decides whether to relay it as it arrives or drop it unread.

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HOST};
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::OriginSettings;
use crate::core::{ProxyError, ProxyRequest};
use crate::trace_fmt;

/// Non-restartable chunk stream of an upstream body.
pub type BodyStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// What the origin answered.  Consumed exactly once.
pub struct OriginResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
    /// Time until the response head arrived.
    pub elapsed: Duration,
}

impl std::fmt::Debug for OriginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

impl OriginResponse {
    fn from_reqwest(response: reqwest::Response, elapsed: Duration) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: response.bytes_stream().boxed(),
            elapsed,
        }
    }

    /// Build a response around an in-memory body.
    pub fn buffered(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let chunk: Bytes = body.into();
        Self {
            status,
            headers,
            body: stream::once(async move { Ok(chunk) }).boxed(),
            elapsed: Duration::ZERO,
        }
    }
}

/// HTTP client bound to the origin base URL.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(settings: &OriginSettings) -> Result<Self, ProxyError> {
        // No overall client timeout: it would also cap how long a relayed
        // body may take to stream.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::Other(format!("failed to build origin client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute origin URL for an inbound path and raw query string.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = String::with_capacity(self.base_url.len() + path.len() + 1);
        url.push_str(&self.base_url);
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    /// Forward a request to the origin.  Every header except `Host` is sent
    /// as received, duplicates included; the query string is passed through
    /// verbatim.  Only connecting is time-bounded, so long polls and slow
    /// uploads are left alone.
    pub async fn forward(&self, request: ProxyRequest) -> Result<OriginResponse, ProxyError> {
        self.send(request, None).await
    }

    /// Like [`forward`](Self::forward), but the response head must also
    /// arrive within the configured origin timeout.
    pub async fn forward_bounded(&self, request: ProxyRequest) -> Result<OriginResponse, ProxyError> {
        self.send(request, Some(self.timeout)).await
    }

    async fn send(
        &self,
        request: ProxyRequest,
        head_timeout: Option<Duration>,
    ) -> Result<OriginResponse, ProxyError> {
        let url = self.target_url(&request.path, request.query.as_deref());

        let mut headers = request.headers;
        headers.remove(HOST);
        trace_fmt!("Upstream", "{} {} with {} header(s)", request.method, request.path, headers.len());

        let mut builder = self.client.request(request.method, url).headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let sent = match head_timeout {
            Some(limit) => timeout(limit, builder.send())
                .await
                .map_err(|_| ProxyError::OriginTimeout(limit))?,
            None => builder.send().await,
        };
        // The URL carries the raw query string, which may hold an access token.
        let response = sent.map_err(|e| ProxyError::OriginUnreachable(e.without_url()))?;

        Ok(OriginResponse::from_reqwest(response, started.elapsed()))
    }
}
