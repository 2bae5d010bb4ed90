// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP server for Turnify.
//!
//! The server is a *thin* wrapper around **hyper-util**.  It owns the
//! listening socket(s) and translates between hyper's body types and the
//! [`ProxyRequest`] / [`ProxyResponse`] types the core uses.
//!
//! **Protocol support**
//! Uses `hyper_util::server::conn::auto::Builder`, so the same connection
//! transparently handles both HTTP/1.1 *and* HTTP/2.
//!
//! ## Body streaming
//! Inbound bodies are streamed straight into the origin request and origin
//! bodies are streamed straight back; nothing is buffered except the
//! substituted credential body.

mod health;


pub use health::HealthServer;

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::body::{Body as _, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use reqwest::Body;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::core::{ProxyCore, ProxyError, ProxyRequest, ProxyResponse, RequestContext};
use crate::{debug_fmt, error_fmt, info_fmt, trace_fmt, warn_fmt};

/// How long open connections get to finish after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port for health/readiness checks; no health listener when unset.
    #[serde(default)]
    pub health_port: Option<u16>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4499
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            health_port: None,
        }
    }
}

/// HTTP server for the proxy.
#[derive(Debug, Clone)]
pub struct ProxyServer {
    config: ServerConfig,
    core: Arc<ProxyCore>,
}

impl ProxyServer {
    pub fn new(config: ServerConfig, core: Arc<ProxyCore>) -> Self {
        Self { config, core }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ProxyError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| ProxyError::Other(format!("Failed to bind {addr}: {e}")))
    }

    /// Bind and serve until Ctrl-C or SIGTERM.
    pub async fn start(&self) -> Result<(), ProxyError> {
        let listener = self.bind().await?;
        let shutdown = shutdown_signal()?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` completes, then
    /// drain open connections.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        info_fmt!("Server", "Turnify listening on http://{}", addr);

        let health = match self.config.health_port {
            Some(port) => {
                let server = HealthServer::bind(&self.config.host, port).await?;
                server.set_ready();
                Some(server)
            }
            None => None,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info_fmt!("Server", "Shutdown requested; no longer accepting connections");
                    break;
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accept = listener.accept() => {
                    match accept {
                        Ok((stream, peer)) => {
                            let core = self.core.clone();
                            let rx = shutdown_rx.clone();
                            connections.spawn(serve_connection(stream, peer, core, rx));
                        }
                        Err(e) => error_fmt!("Server", "Accept error: {}", e),
                    }
                }
            }
        }

        drop(listener);
        if let Some(health) = &health {
            health.set_not_ready();
        }

        info_fmt!("Server", "Draining {} connection(s)", connections.len());
        let _ = shutdown_tx.send(true);

        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            warn_fmt!(
                "Server",
                "Shutdown timed out after {}s; closing remaining connections",
                DRAIN_TIMEOUT.as_secs()
            );
            connections.shutdown().await;
        }

        info_fmt!("Server", "Shutdown complete");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub fn shutdown_signal() -> Result<impl Future<Output = ()> + Send, ProxyError> {
    #[cfg(unix)]
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| ProxyError::Other(format!("Cannot install SIGTERM handler: {e}")))?;

    Ok(async move {
        #[cfg(unix)]
        let sigterm = async move {
            term.recv().await;
        };
        #[cfg(not(unix))]
        let sigterm = std::future::pending::<()>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info_fmt!("Server", "Received Ctrl-C"),
            _ = sigterm => info_fmt!("Server", "Received SIGTERM"),
        }
    })
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    core: Arc<ProxyCore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let service = service_fn(move |req: Request<Incoming>| handle_request(req, core.clone(), peer));
    let builder = AutoBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    // Mostly clients going away mid-stream.
    if let Err(e) = result {
        debug_fmt!("Server", "Connection from {} closed with error: {}", peer, e);
    }
}

/// Convert a hyper request into a proxy request.
fn convert_hyper_request(req: Request<Incoming>, peer: SocketAddr) -> ProxyRequest {
    let (parts, body) = req.into_parts();
    let context = RequestContext::new(&peer.ip().to_string(), &parts.headers);

    // Empty bodies stay empty so bodiless requests are not sent chunked.
    let body = if body.is_end_stream() {
        None
    } else {
        Some(Body::wrap_stream(body.into_data_stream()))
    };

    ProxyRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        context,
    }
}

/// Convert a proxy response into a hyper response.
fn convert_proxy_response(resp: ProxyResponse) -> Result<Response<Body>, ProxyError> {
    trace_fmt!(
        "Server",
        "Converting response with status {} and {} headers",
        resp.status,
        resp.headers.len()
    );

    let status = StatusCode::from_u16(resp.status)
        .map_err(|e| ProxyError::Other(format!("invalid status {}: {e}", resp.status)))?;

    let mut response = Response::new(resp.body);
    *response.status_mut() = status;
    *response.headers_mut() = resp.headers;
    Ok(response)
}

async fn handle_request(
    req: Request<Incoming>,
    core: Arc<ProxyCore>,
    peer: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    debug_fmt!(
        "Server",
        "Received {} request to {} from {} over {:?}",
        req.method(),
        req.uri().path(),
        peer,
        req.version()
    );

    let proxy_req = convert_hyper_request(req, peer);
    let proxy_resp = core.process_request(proxy_req).await;

    match convert_proxy_response(proxy_resp) {
        Ok(response) => Ok(response),
        Err(e) => {
            error_fmt!("Server", "Failed to build response: {}", e);
            let mut response = Response::new(Body::from("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            Ok(response)
        }
    }
}
