// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging setup for Turnify.
//!
//! Code logs through the `log` facade (see the `*_fmt!` macros).  The sink is
//! chosen once at startup: `env_logger` by default, or the slog structured
//! sink when `logging.structured` is set.

pub mod config;
pub mod structured;
mod wrapper;

use std::sync::Once;

use config::LoggingConfig;
use structured::{init_global_logger, LoggerGuard};

static INIT: Once = Once::new();

/// Install the process-wide logger.
///
/// Only the first call has any effect.  The returned guard must be kept
/// alive for as long as structured logging is wanted; it is `None` for the
/// `env_logger` sink and for repeated calls.
pub fn init(config: &LoggingConfig) -> Option<LoggerGuard> {
    let mut guard = None;

    INIT.call_once(|| {
        let level = config.level_filter();

        if config.structured {
            guard = Some(init_global_logger(&config.to_logger_config()));
            let bridged = level.to_level().unwrap_or(log::Level::Error);
            if let Err(e) = slog_stdlog::init_with_level(bridged) {
                eprintln!("Failed to bridge log records to slog: {e}");
            }
            log::set_max_level(level);
        } else {
            let env = env_logger::Env::default().filter_or("RUST_LOG", level.as_str());
            if let Err(e) = env_logger::Builder::from_env(env)
                .format_timestamp_millis()
                .format_target(true)
                .try_init()
            {
                eprintln!("Failed to initialise logging: {e}");
            }
        }

        log::info!("Logging initialized at level: {}", log::max_level());
    });

    guard
}
