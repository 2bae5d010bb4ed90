// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Context-tagged logging macros.
//!
//! Everything goes through the standard `log` facade as `[Context] message`.
//! When structured logging is enabled the `slog_stdlog` bridge installed in
//! [`super::init`] forwards the records to `slog`.

/// Log an error message with context.
#[macro_export]
macro_rules! error_fmt {
    ($context:expr, $($arg:tt)+) => {
        log::error!("[{}] {}", $context, format_args!($($arg)+))
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! warn_fmt {
    ($context:expr, $($arg:tt)+) => {
        log::warn!("[{}] {}", $context, format_args!($($arg)+))
    };
}

/// Log an info message with context.
#[macro_export]
macro_rules! info_fmt {
    ($context:expr, $($arg:tt)+) => {
        log::info!("[{}] {}", $context, format_args!($($arg)+))
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! debug_fmt {
    ($context:expr, $($arg:tt)+) => {
        log::debug!("[{}] {}", $context, format_args!($($arg)+))
    };
}

/// Log a trace message with context.
#[macro_export]
macro_rules! trace_fmt {
    ($context:expr, $($arg:tt)+) => {
        log::trace!("[{}] {}", $context, format_args!($($arg)+))
    };
}
