// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment variable-based configuration provider implementation.
//!
//! `TURNIFY_ORIGIN__BASE_URL` resolves to `origin.base_url`: the prefix is
//! stripped, the rest is lowercased and `__` separates nesting levels, so
//! single underscores survive inside key names.
//!
//! The variable names used by earlier deployments are honoured as aliases
//! (see [`LEGACY_ALIASES`]).  A prefixed variable for the same key wins.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;

use super::ConfigError;
use super::ConfigProvider;

/// Un-prefixed variable names mapped onto their configuration keys.
pub const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("SYNAPSE_BASE_URL", "origin.base_url"),
    ("CF_TURN_TOKEN_ID", "provider.token_id"),
    ("CF_TURN_API_TOKEN", "provider.api_token"),
    ("TURN_CREDENTIAL_TTL_SECONDS", "provider.ttl"),
    ("LOG_LEVEL", "logging.level"),
];

/// Configuration provider that retrieves values from environment variables.
#[derive(Debug)]
pub struct EnvConfigProvider {
    prefix: String,
    cache: HashMap<String, String>,
}

impl EnvConfigProvider {
    /// Create a provider over the current process environment.
    pub fn new(prefix: &str) -> Self {
        Self::from_vars(prefix, env::vars())
    }

    /// Create a provider over an explicit set of variables.
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut provider = Self {
            prefix: prefix.to_string(),
            cache: HashMap::new(),
        };
        provider.load(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        provider
    }

    /// Re-read the process environment.
    fn load(&mut self, vars: impl Iterator<Item = (String, String)>) {
        self.cache.clear();

        let mut prefixed = Vec::new();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(&self.prefix) {
                if !stripped.is_empty() {
                    prefixed.push((Self::to_config_key(stripped), value));
                }
            } else if let Some((_, config_key)) =
                LEGACY_ALIASES.iter().find(|(alias, _)| *alias == key)
            {
                self.cache.entry(config_key.to_string()).or_insert(value);
            }
        }

        // Prefixed variables go in last so they override aliases.
        self.cache.extend(prefixed);
    }

    fn to_config_key(stripped: &str) -> String {
        stripped
            .to_lowercase()
            .split("__")
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Parse a variable into a JSON value.  Only lossless interpretations are
    /// taken; `0042` or `1e5` stay strings.
    fn parse_value_to_json(value: &str) -> Value {
        let trimmed = value.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed.starts_with('"') {
            if let Ok(json_value) = serde_json::from_str(value) {
                return json_value;
            }
        }

        if value.eq_ignore_ascii_case("true") {
            return json!(true);
        } else if value.eq_ignore_ascii_case("false") {
            return json!(false);
        }

        if let Ok(int_val) = value.parse::<i64>() {
            if int_val.to_string() == value {
                return json!(int_val);
            }
        }

        if let Ok(float_val) = value.parse::<f64>() {
            if float_val.is_finite() && float_val.to_string() == value {
                return json!(float_val);
            }
        }

        json!(value)
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new("TURNIFY_")
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "env"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.cache.get(key).map(|v| Self::parse_value_to_json(v)))
    }
}
