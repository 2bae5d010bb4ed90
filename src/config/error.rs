// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the configuration module.

use std::fmt;
use std::io;
use thiserror::Error;

/// Errors that can occur while loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value could not be parsed or deserialized.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// An IO error occurred (e.g., while reading a configuration file).
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// An error raised by a specific configuration provider.
    #[error("provider error: {provider}: {message}")]
    ProviderError { provider: String, message: String },

    /// A value parsed fine but is not acceptable.
    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    /// Create a new provider error.
    pub fn provider_error<P: fmt::Display, M: fmt::Display>(provider: P, message: M) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new validation error for `key`.
    pub fn invalid<K: fmt::Display, R: fmt::Display>(key: K, reason: R) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
