// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structured logging sink built on slog, with terminal or JSON output.

use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_json::Json;
use slog_term::{FullFormat, TermDecorator};
use std::io;

/// Structured logging format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable terminal output
    Terminal,
    /// JSON formatted output
    Json,
}

/// Structured logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LogFormat,
    pub level: slog::Level,
    /// Key-value pairs added to every record
    pub static_fields: Vec<(String, String)>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            level: slog::Level::Info,
            static_fields: Vec::new(),
        }
    }
}

/// Create a structured logger with the given configuration
pub fn create_logger(config: &LoggerConfig) -> Logger {
    let logger = match config.format {
        LogFormat::Terminal => {
            let decorator = TermDecorator::new().build();
            let drain = FullFormat::new(decorator).build().fuse();
            let drain = drain.filter_level(config.level).fuse();
            Logger::root(Async::new(drain).build().fuse(), o!())
        }
        LogFormat::Json => {
            let drain = Json::new(io::stdout()).add_default_keys().build().fuse();
            let drain = drain.filter_level(config.level).fuse();
            Logger::root(Async::new(drain).build().fuse(), o!())
        }
    };

    config.static_fields.iter().fold(logger, |logger, (key, value)| {
        // slog keys are 'static; static fields are set once per process.
        let key: &'static str = Box::leak(key.clone().into_boxed_str());
        logger.new(o!(key => value.clone()))
    })
}

/// Keeps the global structured logger installed while alive.
pub struct LoggerGuard {
    _guard: slog_scope::GlobalLoggerGuard,
}

impl std::fmt::Debug for LoggerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LoggerGuard")
    }
}

/// Install the structured logger as the global slog scope logger.
pub fn init_global_logger(config: &LoggerConfig) -> LoggerGuard {
    let guard = slog_scope::set_global_logger(create_logger(config));
    LoggerGuard { _guard: guard }
}
