// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[derive(Debug)]
struct MockConfigProvider {
    values: HashMap<String, Value>,
    name: String,
}

impl MockConfigProvider {
    fn new(name: &str) -> Self {
        Self {
            values: HashMap::new(),
            name: name.to_string(),
        }
    }

    fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

impl ConfigProvider for MockConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

fn config_with(values: &[(&str, Value)]) -> Config {
    let provider = values
        .iter()
        .fold(MockConfigProvider::new("mock"), |p, (k, v)| {
            p.with_value(k, v.clone())
        });
    Config::builder().with_provider(provider).build()
}

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

#[test]
fn test_later_provider_wins() {
    let low = MockConfigProvider::new("low")
        .with_value("origin.base_url", json!("http://low:8008"))
        .with_value("provider.ttl", json!(60));
    let high = MockConfigProvider::new("high").with_value("origin.base_url", json!("http://high:8008"));

    let config = Config::builder().with_provider(low).with_provider(high).build();

    assert_eq!(config.provider_names(), vec!["low", "high"]);
    assert_eq!(
        config.get::<String>("origin.base_url").unwrap().as_deref(),
        Some("http://high:8008")
    );
    // Falls through to the lower provider when the higher one lacks the key.
    assert_eq!(config.get::<u32>("provider.ttl").unwrap(), Some(60));
    assert_eq!(config.get::<u32>("missing").unwrap(), None);
    assert_eq!(config.get_or_default("missing", 7u32).unwrap(), 7);
}

#[test]
fn test_get_string_accepts_scalars() {
    let config = config_with(&[
        ("a", json!("text")),
        ("b", json!(12345)),
        ("c", json!(true)),
        ("d", json!({"nested": 1})),
    ]);

    assert_eq!(config.get_string("a").unwrap().as_deref(), Some("text"));
    assert_eq!(config.get_string("b").unwrap().as_deref(), Some("12345"));
    assert_eq!(config.get_string("c").unwrap().as_deref(), Some("true"));
    assert!(matches!(config.get_string("d"), Err(ConfigError::ParseError(_))));
    assert_eq!(config.get_string("nope").unwrap(), None);
}

#[test]
fn test_type_mismatch_is_parse_error() {
    let config = config_with(&[("server.port", json!("not a port"))]);
    let err = config.get::<u16>("server.port").unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_toml_file_provider() {
    let file = temp_file(
        ".toml",
        r#"
[origin]
base_url = "http://synapse.internal:8008"

[provider]
ttl = 600
"#,
    );

    let provider = FileConfigProvider::new(file.path()).unwrap();
    assert_eq!(provider.path(), file.path());
    assert!(provider.has("origin.base_url"));
    assert!(provider.has("provider"));
    assert!(!provider.has("provider.token_id"));
    assert_eq!(
        provider.get::<String>("origin.base_url").unwrap().as_deref(),
        Some("http://synapse.internal:8008")
    );
    assert_eq!(provider.get::<u32>("provider.ttl").unwrap(), Some(600));
}

#[test]
fn test_yaml_and_json_file_providers() {
    let yaml = temp_file(".yaml", "cors:\n  enabled: false\n");
    let provider = FileConfigProvider::new(yaml.path()).unwrap();
    assert_eq!(provider.get::<bool>("cors.enabled").unwrap(), Some(false));

    let json_file = temp_file(".json", r#"{"server": {"port": 5000}}"#);
    let provider = FileConfigProvider::new(json_file.path()).unwrap();
    assert_eq!(provider.get::<u16>("server.port").unwrap(), Some(5000));
}

#[test]
fn test_file_provider_rejects_bad_input() {
    let unknown = temp_file(".ini", "a=b");
    assert!(matches!(
        FileConfigProvider::new(unknown.path()),
        Err(ConfigError::ProviderError { .. })
    ));

    let broken = temp_file(".json", "{not json");
    let err = FileConfigProvider::new(broken.path()).unwrap_err();
    assert!(err.to_string().contains("invalid JSON"));

    let scalar = temp_file(".json", "42");
    let err = FileConfigProvider::new(scalar.path()).unwrap_err();
    assert!(err.to_string().contains("root configuration must be an object"));

    assert!(FileConfigProvider::new("/definitely/not/here.toml").is_err());
}

#[test]
fn test_settings_defaults() {
    let settings = Settings::from_config(&Config::builder().build()).unwrap();

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 4499);
    assert_eq!(settings.server.health_port, None);
    assert_eq!(settings.origin.base_url, "http://synapse:8008");
    assert_eq!(settings.origin.timeout, Duration::from_secs(30));
    assert_eq!(settings.provider.ttl, 86_400);
    assert_eq!(settings.provider.timeout, Duration::from_secs(10));
    assert_eq!(
        settings.provider.url,
        "https://rtc.live.cloudflare.com/v1/turn/keys//credentials/generate"
    );
    assert!(settings.cors.enabled);
    assert_eq!(settings.logging.level, "info");
    assert!(!settings.logging.structured);
}

#[test]
fn test_settings_expand_token_id_and_trim_base_url() {
    let config = config_with(&[
        ("origin.base_url", json!("http://localhost:8008/")),
        ("provider.token_id", json!("abc123")),
        ("provider.api_token", json!("secret-token")),
        ("provider.ttl", json!(3600)),
        ("server.health_port", json!(4500)),
    ]);
    let settings = Settings::from_config(&config).unwrap();

    assert_eq!(settings.origin.base_url, "http://localhost:8008");
    assert_eq!(
        settings.provider.url,
        "https://rtc.live.cloudflare.com/v1/turn/keys/abc123/credentials/generate"
    );
    assert_eq!(settings.provider.ttl, 3600);
    assert_eq!(settings.server.health_port, Some(4500));
}

#[test]
fn test_settings_debug_redacts_secrets() {
    let config = config_with(&[
        ("provider.token_id", json!("tokid")),
        ("provider.api_token", json!("supersecret")),
    ]);
    let settings = Settings::from_config(&config).unwrap();
    let rendered = format!("{settings:?}");

    assert!(!rendered.contains("supersecret"));
    assert!(!rendered.contains("tokid"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn test_settings_rejects_invalid_values() {
    for (key, value) in [
        ("provider.ttl", json!(0)),
        ("provider.ttl", json!(-5)),
        ("origin.timeout", json!(0)),
        ("origin.base_url", json!("not a url")),
        ("origin.base_url", json!("ftp://synapse")),
        ("provider.url", json!("mailto:someone@example.com")),
    ] {
        let result = Settings::from_config(&config_with(&[(key, value.clone())]));
        match result {
            Err(ConfigError::Invalid { key: k, .. }) => assert_eq!(k, key),
            other => panic!("expected Invalid for {key}={value}, got {other:?}"),
        }
    }
}
