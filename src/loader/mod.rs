// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry-point – "turn the key and go".
//!
//! The [`TurnifyLoader`] stacks the configuration providers, resolves the
//! [`Settings`], installs the logger and wires a [`ProxyCore`] into a
//! [`ProxyServer`].

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider, Settings};
use crate::core::{ProxyCore, ProxyError};
use crate::credentials::CredentialProvider;
use crate::logging::{self, structured::LoggerGuard};
use crate::server::ProxyServer;
use crate::{debug_fmt, info_fmt};

/// Errors that can occur during Turnify initialization.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("proxy error: {0}")]
    ProxyError(#[from] ProxyError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Builder for initializing and configuring Turnify.
#[derive(Debug, Default)]
pub struct TurnifyLoader {
    config: Option<Config>,
    config_file_path: Option<PathBuf>,
    use_env_vars: bool,
    env_prefix: Option<String>,
    extra_providers: Vec<Arc<dyn ConfigProvider>>,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
}

impl TurnifyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a prebuilt configuration instead of files and environment.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load a JSON, TOML or YAML file as the lowest priority layer.
    pub fn with_config_file(mut self, file_path: impl Into<PathBuf>) -> Self {
        self.config_file_path = Some(file_path.into());
        self
    }

    /// Layer the process environment over the file.
    pub fn with_env_vars(mut self) -> Self {
        self.use_env_vars = true;
        self
    }

    /// Set a custom prefix for environment variables (default is `TURNIFY_`).
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.use_env_vars = true;
        self
    }

    /// Add a configuration provider on top of every other layer.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.extra_providers.push(Arc::new(provider));
        self
    }

    /// Mint credentials with a custom provider instead of the HTTP one.
    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    fn build_config(&self) -> Result<Config, LoaderError> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }

        let mut builder = Config::builder();

        if let Some(path) = &self.config_file_path {
            builder = builder.with_provider(FileConfigProvider::new(path)?);
        }

        if self.use_env_vars {
            builder = builder.with_provider(match &self.env_prefix {
                Some(prefix) => EnvConfigProvider::new(prefix),
                None => EnvConfigProvider::default(),
            });
        }

        for provider in &self.extra_providers {
            builder = builder.with_shared_provider(provider.clone());
        }

        Ok(builder.build())
    }

    /// Resolve settings and assemble the proxy.
    pub fn build(self) -> Result<Turnify, LoaderError> {
        let config = self.build_config()?;
        let settings = Settings::from_config(&config)?;

        let log_guard = logging::init(&settings.logging);
        info_fmt!("Startup", "Turnify starting up");
        debug_fmt!("Startup", "Configuration layers: {:?}", config.provider_names());
        debug_fmt!("Startup", "Resolved settings: {:?}", settings);
        settings.warn_suspicious();

        let core = match self.credential_provider {
            Some(provider) => ProxyCore::with_provider(&settings, provider)?,
            None => ProxyCore::new(&settings)?,
        };

        info_fmt!(
            "Startup",
            "Forwarding to {} with credential ttl {}s",
            settings.origin.base_url,
            settings.provider.ttl
        );

        let server = ProxyServer::new(settings.server.clone(), Arc::new(core));

        Ok(Turnify {
            settings,
            server,
            _log_guard: log_guard.map(Arc::new),
        })
    }
}

/// An assembled proxy, ready to serve.
#[derive(Debug, Clone)]
pub struct Turnify {
    settings: Settings,
    server: ProxyServer,
    _log_guard: Option<Arc<LoggerGuard>>,
}

impl Turnify {
    pub fn loader() -> TurnifyLoader {
        TurnifyLoader::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn server(&self) -> &ProxyServer {
        &self.server
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, LoaderError> {
        Ok(self.server.bind().await?)
    }

    /// Serve on an already bound listener until `shutdown` completes.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), LoaderError>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        Ok(self.server.serve(listener, shutdown).await?)
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn start(&self) -> Result<(), LoaderError> {
        Ok(self.server.start().await?)
    }
}
