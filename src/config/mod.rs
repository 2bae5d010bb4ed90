// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turnify configuration subsystem
//!
//! A running proxy is created from an ordered list of [`ConfigProvider`]s;
//! later providers override earlier ones.  The binary stacks them like this:
//!
//! 1. `FileConfigProvider` – `turnify.{toml,json,yaml}` (optional)
//! 2. `EnvConfigProvider`  – `TURNIFY_ORIGIN__BASE_URL=http://synapse:8008`
//!
//! Raw values are resolved into an immutable [`Settings`] exactly once, at
//! startup.  Nothing reads the provider chain after that.
//!
//! | key | default | description |
//! |-----|---------|-------------|
//! | `server.host`         | `0.0.0.0`             | Address to bind              |
//! | `server.port`         | `4499`                | Proxy port                   |
//! | `server.health_port`  | –                     | Health listener, off if unset |
//! | `origin.base_url`     | `http://synapse:8008` | Homeserver to forward to     |
//! | `origin.timeout`      | `30`                  | Connect, and credential route head |
//! | `provider.url`        | Cloudflare endpoint   | `{token_id}` is substituted  |
//! | `provider.token_id`   | `""`                  | TURN key identifier          |
//! | `provider.api_token`  | `""`                  | Bearer token                 |
//! | `provider.ttl`        | `86400`               | Credential lifetime, seconds |
//! | `provider.timeout`    | `10`                  | Seconds per provider call    |
//! | `cors.enabled`        | `true`                | Answer cross-origin requests |
//! | `logging.level`       | `info`                | Log verbosity                |
//! | `logging.structured`  | `false`               | Use the slog sink            |
//! | `logging.format`      | `terminal`            | `terminal` or `json`         |

mod env;
pub mod error;
mod file;
mod settings;

#[cfg(test)]
mod tests;

pub use env::EnvConfigProvider;
pub use error::ConfigError;
pub use file::{FileConfigProvider, FileFormat};
pub use settings::{OriginSettings, ProviderSettings, Settings, DEFAULT_PROVIDER_URL};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Core configuration provider trait that all configuration sources must implement.
/// This trait is object-safe since it doesn't contain generic methods.
pub trait ConfigProvider: Debug + Send + Sync {
    /// Check if the configuration provider has a value for the given key.
    fn has(&self, key: &str) -> bool;

    /// Get the name of the configuration provider for debugging purposes.
    fn provider_name(&self) -> &str;

    /// Get a raw configuration value by key.
    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError>;
}

/// Typed access on top of [`ConfigProvider`].  Not object-safe.
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a configuration value by key and deserialize it to the specified type.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => deserialize(key, value).map(Some),
            None => Ok(None),
        }
    }
}

impl<T: ConfigProvider> ConfigProviderExt for T {}

fn deserialize<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value)
        .map_err(|e| ConfigError::ParseError(format!("failed to deserialize '{key}': {e}")))
}

/// Builder for the configuration system.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration provider.  It takes priority over every provider
    /// added before it.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Add a provider that is already shared.
    pub fn with_shared_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> Config {
        Config {
            providers: self.providers,
        }
    }
}

/// The provider chain.
#[derive(Debug, Clone)]
pub struct Config {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Names of the providers in priority order, lowest first.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    /// Get a raw value from the highest priority provider that has the key.
    pub fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        for provider in self.providers.iter().rev() {
            if provider.has(key) {
                return provider.get_raw(key);
            }
        }
        Ok(None)
    }

    /// Get a configuration value by key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => deserialize(key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Get a configuration value by key with a default fallback value.
    pub fn get_or_default<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Get a string value.  Scalars are accepted as well, since the
    /// environment provider types digit-only values as numbers.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get_raw(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(other) => Err(ConfigError::ParseError(format!(
                "failed to deserialize '{key}': expected a string, found {other}"
            ))),
        }
    }
}
