// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turnify - a reverse proxy in front of a Matrix homeserver that swaps the
//! homeserver's TURN credentials for freshly minted ones.
//!
//! Every request is forwarded to the origin.  Only an authenticated `GET`
//! on `/<prefix>/voip/turnServer` that the origin answers with `200` is
//! rewritten: its body is replaced by credentials from a relay provider
//! (Cloudflare Calls by default).  When the provider fails, the origin's
//! response is relayed as is.
//!
//! # Configuration System
//!
//! - **Multiple Configuration Sources**: JSON, TOML or YAML files plus
//!   `TURNIFY_`-prefixed environment variables.
//! - **Layered Configuration**: later providers override earlier ones.
//! - **Validated once**: everything is resolved into a read-only
//!   [`Settings`] at startup.
//!
//! # Embedding
//!
//! ```rust,no_run
//! use turnify::Turnify;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let turnify = Turnify::loader()
//!         .with_config_file("turnify.toml")
//!         .with_env_vars()
//!         .build()?;
//!
//!     turnify.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! Credentials can come from any source by implementing
//! [`CredentialProvider`] and passing it to
//! [`TurnifyLoader::with_credential_provider`].

pub mod classifier;
pub mod config;
pub mod core;
pub mod cors;
pub mod credentials;
pub mod framing;
pub mod loader;
pub mod logging;
pub mod router;
pub mod server;
pub mod upstream;

pub use crate::config::{
    Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider, Settings,
};
pub use crate::core::{ProxyCore, ProxyError, ProxyRequest, ProxyResponse, RequestContext};
pub use crate::credentials::{
    BrokerError, CredentialBroker, CredentialProvider, HttpCredentialProvider,
};
pub use crate::loader::{LoaderError, Turnify, TurnifyLoader};
pub use crate::server::{ProxyServer, ServerConfig};
