// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use crate::credentials::{BrokerError, CredentialRequest, IceServers};
use async_trait::async_trait;
use serde_json::{json, Value};
use serial_test::serial;
use std::collections::HashMap;
use std::env;
use std::io::Write;

// Mock config provider for testing
#[derive(Debug)]
struct MockConfigProvider {
    values: HashMap<String, Value>,
}

impl MockConfigProvider {
    fn new(pairs: &[(&str, Value)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}

impl ConfigProvider for MockConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

#[derive(Debug)]
struct NoopProvider;

#[async_trait]
impl CredentialProvider for NoopProvider {
    fn name(&self) -> &str {
        "noop"
    }

    async fn issue(&self, _request: CredentialRequest) -> Result<IceServers, BrokerError> {
        Err(BrokerError::Status(501))
    }
}

#[test]
fn test_build_with_provider() {
    let turnify = TurnifyLoader::new()
        .with_provider(MockConfigProvider::new(&[
            ("server.port", json!(8080)),
            ("server.host", json!("127.0.0.1")),
            ("provider.token_id", json!("abc")),
        ]))
        .build()
        .unwrap();

    let settings = turnify.settings();
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(
        settings.provider.url,
        "https://rtc.live.cloudflare.com/v1/turn/keys/abc/credentials/generate"
    );
    assert_eq!(turnify.server().config().port, 8080);
}

#[test]
fn test_build_with_custom_credential_provider() {
    let turnify = Turnify::loader()
        .with_config(
            Config::builder()
                .with_provider(MockConfigProvider::new(&[("provider.ttl", json!(600))]))
                .build(),
        )
        .with_credential_provider(Arc::new(NoopProvider))
        .build()
        .unwrap();

    assert_eq!(turnify.settings().provider.ttl, 600);
}

#[test]
fn test_invalid_settings_fail_build() {
    let err = TurnifyLoader::new()
        .with_provider(MockConfigProvider::new(&[("provider.ttl", json!(0))]))
        .build()
        .unwrap_err();

    assert!(matches!(err, LoaderError::ConfigError(ConfigError::Invalid { .. })), "{err}");
}

#[test]
fn test_missing_config_file_fails_build() {
    let err = TurnifyLoader::new()
        .with_config_file("/definitely/not/here/turnify.toml")
        .build()
        .unwrap_err();

    assert!(matches!(err, LoaderError::ConfigError(_)), "{err}");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[origin]
base_url = "http://file-origin:8008"

[provider]
ttl = 120
"#
    )
    .unwrap();

    unsafe {
        env::set_var("TURNIFY_LOADER_TEST_ORIGIN__BASE_URL", "http://env-origin:8008");
    }

    let result = TurnifyLoader::new()
        .with_config_file(file.path())
        .with_env_prefix("TURNIFY_LOADER_TEST_")
        .build();

    unsafe {
        env::remove_var("TURNIFY_LOADER_TEST_ORIGIN__BASE_URL");
    }

    let turnify = result.unwrap();
    assert_eq!(turnify.settings().origin.base_url, "http://env-origin:8008");
    assert_eq!(turnify.settings().provider.ttl, 120);
}

#[tokio::test]
async fn test_bind_and_serve() {
    let turnify = TurnifyLoader::new()
        .with_provider(MockConfigProvider::new(&[
            ("server.host", json!("127.0.0.1")),
            ("server.port", json!(0)),
        ]))
        .build()
        .unwrap();

    let listener = turnify.bind().await.unwrap();
    turnify.serve(listener, async {}).await.unwrap();
}
