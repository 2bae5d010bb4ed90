// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Liveness and readiness probes on a separate port.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::core::ProxyError;
use crate::{debug_fmt, info_fmt};

/// Answers `/health` and `/ready` until dropped.
#[derive(Debug)]
pub struct HealthServer {
    is_ready: Arc<AtomicBool>,
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Bind the probe listener and start answering.  Not ready until
    /// [`set_ready`](Self::set_ready) is called.
    pub async fn bind(host: &str, port: u16) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| ProxyError::Other(format!("Failed to bind health port {port}: {e}")))?;
        let local_addr = listener.local_addr()?;
        info_fmt!("Health", "Health checks on http://{}", local_addr);

        let is_ready = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(accept_loop(listener, is_ready.clone()));

        Ok(Self {
            is_ready,
            local_addr,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed)
    }

    pub fn set_ready(&self) {
        self.is_ready.store(true, Ordering::Relaxed);
    }

    pub fn set_not_ready(&self) {
        self.is_ready.store(false, Ordering::Relaxed);
    }
}

impl Drop for HealthServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn accept_loop(listener: TcpListener, is_ready: Arc<AtomicBool>) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                debug_fmt!("Health", "Accept failed: {}", e);
                continue;
            }
        };

        let ready = is_ready.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let ready = ready.load(Ordering::Relaxed);
                async move { Ok::<_, Infallible>(probe(req.uri().path(), ready)) }
            });

            if let Err(e) = AutoBuilder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug_fmt!("Health", "Connection error: {}", e);
            }
        });
    }
}

fn probe(path: &str, ready: bool) -> Response<Full<Bytes>> {
    let (status, body) = match path {
        "/health" => (StatusCode::OK, "OK"),
        "/ready" if ready => (StatusCode::OK, "READY"),
        "/ready" => (StatusCode::SERVICE_UNAVAILABLE, "NOT READY"),
        _ => (StatusCode::NOT_FOUND, "Not Found"),
    };

    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
