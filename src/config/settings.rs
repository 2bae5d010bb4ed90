// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolved, validated, read-only settings.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::Url;

use super::{Config, ConfigError};
use crate::cors::CorsConfig;
use crate::logging::config::LoggingConfig;
use crate::server::ServerConfig;
use crate::warn_fmt;

/// Cloudflare Calls TURN key endpoint.  `{token_id}` is replaced at startup.
pub const DEFAULT_PROVIDER_URL: &str =
    "https://rtc.live.cloudflare.com/v1/turn/keys/{token_id}/credentials/generate";

const DEFAULT_ORIGIN_URL: &str = "http://synapse:8008";
const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TTL_SECS: i64 = 86_400;

/// Where inbound requests are forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginSettings {
    /// Absolute base URL without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

/// How relay credentials are minted.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Fully expanded endpoint URL.
    pub url: String,
    pub token_id: String,
    pub api_token: String,
    /// Lifetime requested for every credential, in seconds.
    pub ttl: u32,
    pub timeout: Duration,
}

// The URL embeds the token identifier, so neither is printed.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("url", &"<redacted>")
            .field("token_id", &"<redacted>")
            .field("api_token", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Everything the proxy needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub origin: OriginSettings,
    pub provider: ProviderSettings,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Resolve and validate every key from the provider chain.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            host: config
                .get_string("server.host")?
                .unwrap_or(server_defaults.host),
            port: config.get_or_default("server.port", server_defaults.port)?,
            health_port: config.get("server.health_port")?,
        };

        let origin = OriginSettings {
            base_url: validate_url(
                "origin.base_url",
                &config
                    .get_string("origin.base_url")?
                    .unwrap_or_else(|| DEFAULT_ORIGIN_URL.to_string()),
            )?,
            timeout: seconds(config, "origin.timeout", DEFAULT_ORIGIN_TIMEOUT_SECS)?,
        };

        let token_id = config.get_string("provider.token_id")?.unwrap_or_default();
        let api_token = config.get_string("provider.api_token")?.unwrap_or_default();
        let url_template = config
            .get_string("provider.url")?
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string());

        let ttl: i64 = config.get_or_default("provider.ttl", DEFAULT_TTL_SECS)?;
        let ttl = u32::try_from(ttl)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| ConfigError::invalid("provider.ttl", "must be a positive number of seconds"))?;

        let provider = ProviderSettings {
            url: validate_url("provider.url", &url_template.replace("{token_id}", &token_id))?,
            token_id,
            api_token,
            ttl,
            timeout: seconds(config, "provider.timeout", DEFAULT_PROVIDER_TIMEOUT_SECS)?,
        };

        let cors = CorsConfig {
            enabled: config.get_or_default("cors.enabled", CorsConfig::default().enabled)?,
        };

        let logging_defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            level: config
                .get_string("logging.level")?
                .unwrap_or(logging_defaults.level),
            structured: config.get_or_default("logging.structured", logging_defaults.structured)?,
            format: config
                .get_string("logging.format")?
                .unwrap_or(logging_defaults.format),
            static_fields: config
                .get::<HashMap<String, String>>("logging.static_fields")?
                .unwrap_or_default(),
        };

        Ok(Self {
            server,
            origin,
            provider,
            cors,
            logging,
        })
    }

    /// Emit warnings for settings that are legal but almost certainly wrong.
    pub fn warn_suspicious(&self) {
        if self.provider.token_id.is_empty() {
            warn_fmt!("Config", "provider.token_id is empty; credential minting will fail");
        }
        if self.provider.api_token.is_empty() {
            warn_fmt!("Config", "provider.api_token is empty; credential minting will fail");
        }
    }
}

fn seconds(config: &Config, key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = config.get_or_default(key, default)?;
    if secs == 0 {
        return Err(ConfigError::invalid(key, "must be at least one second"));
    }
    Ok(Duration::from_secs(secs))
}

fn validate_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ConfigError::invalid(key, e))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(ConfigError::invalid(
            key,
            format!("unsupported scheme '{other}'"),
        )),
    }
}
