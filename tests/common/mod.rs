// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common test utilities for Turnify integration tests.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use turnify::config::{Config, ConfigError, ConfigProvider};
use turnify::Turnify;
use wiremock::MockServer;

pub const TURN_PATH: &str = "/_matrix/client/v3/voip/turnServer";
pub const TOKEN_ID: &str = "test-token-id";
pub const API_TOKEN: &str = "test-api-token";
pub const TTL: u32 = 86_400;

/// Test configuration provider for consistent test setups
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TestConfigProvider {
    values: HashMap<String, Value>,
}

#[allow(dead_code)]
impl TestConfigProvider {
    /// Create a provider from a nested JSON document.
    pub fn from_json(config: Value) -> Self {
        let mut values = HashMap::new();
        Self::flatten_json(&config, "", &mut values);
        Self { values }
    }

    /// Helper function to flatten JSON into dot-notation keys
    fn flatten_json(value: &Value, prefix: &str, values: &mut HashMap<String, Value>) {
        if !prefix.is_empty() {
            values.insert(prefix.to_string(), value.clone());
        }
        if let Value::Object(obj) = value {
            for (key, val) in obj {
                let new_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                Self::flatten_json(val, &new_key, values);
            }
        }
    }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

impl ConfigProvider for TestConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "test"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

/// Configuration pointing the proxy at the given origin and provider URLs.
#[allow(dead_code)]
pub fn test_config(origin_url: &str, provider_base: &str) -> TestConfigProvider {
    TestConfigProvider::from_json(json!({
        "server": { "host": "127.0.0.1", "port": 0 },
        "origin": { "base_url": origin_url, "timeout": 5 },
        "provider": {
            "url": format!("{provider_base}/v1/turn/keys/{{token_id}}/credentials/generate"),
            "token_id": TOKEN_ID,
            "api_token": API_TOKEN,
            "ttl": TTL,
            "timeout": 2
        },
        "logging": { "level": "debug" }
    }))
}

/// Path the provider mock is called on.
#[allow(dead_code)]
pub fn provider_path() -> String {
    format!("/v1/turn/keys/{TOKEN_ID}/credentials/generate")
}

/// A well-formed provider answer.
#[allow(dead_code)]
pub fn ice_servers(urls: &[&str], username: &str, credential: &str) -> Value {
    json!({
        "iceServers": {
            "urls": urls,
            "username": username,
            "credential": credential
        }
    })
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A proxy running on an ephemeral port.  Shut down on drop.
pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

#[allow(dead_code)]
impl TestProxy {
    pub async fn start(provider: TestConfigProvider) -> Self {
        let turnify = Turnify::loader()
            .with_config(Config::builder().with_provider(provider).build())
            .build()
            .expect("build proxy");

        let listener = turnify.bind().await.expect("bind proxy");
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            turnify
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
                .expect("serve");
        });

        Self {
            addr,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Proxy in front of `origin`, minting credentials from `provider`.
    pub async fn with_mocks(origin: &MockServer, provider: &MockServer) -> Self {
        Self::start(test_config(&origin.uri(), &provider.uri())).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting and wait for open connections to drain.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// A client that neither pools nor follows redirects.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
