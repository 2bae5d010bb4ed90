// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for logging.

use crate::logging::structured::{LogFormat, LoggerConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (`trace`, `debug`, `info`, `warn`, `error`, `off`)
    #[serde(default = "default_level")]
    pub level: String,

    /// Whether to use the structured slog sink
    #[serde(default)]
    pub structured: bool,

    /// Structured output format (`terminal` or `json`)
    #[serde(default = "default_format")]
    pub format: String,

    /// Static fields attached to every structured record
    #[serde(default)]
    pub static_fields: HashMap<String, String>,
}

fn default_format() -> String {
    "terminal".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            structured: false,
            format: default_format(),
            static_fields: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Level for the `log` facade.  Unknown names fall back to `info`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "warn" | "warning" => LevelFilter::Warn,
            "error" | "critical" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        }
    }

    /// Convert to the slog sink configuration.
    pub fn to_logger_config(&self) -> LoggerConfig {
        let mut static_fields: Vec<(String, String)> = self
            .static_fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        static_fields.sort();

        LoggerConfig {
            format: match self.format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Terminal,
            },
            level: match self.level_filter() {
                LevelFilter::Trace => slog::Level::Trace,
                LevelFilter::Debug => slog::Level::Debug,
                LevelFilter::Warn => slog::Level::Warning,
                LevelFilter::Error => slog::Level::Error,
                LevelFilter::Off => slog::Level::Critical,
                LevelFilter::Info => slog::Level::Info,
            },
            static_fields,
        }
    }
}
