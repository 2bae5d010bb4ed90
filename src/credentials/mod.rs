// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay credential minting.
//!
//! A [`CredentialProvider`] talks to whatever service issues TURN
//! credentials.  The [`CredentialBroker`] asks it for a credential with the
//! configured lifetime and renders the Matrix `turnServer` response body:
//!
//! ```json
//! {"username":"…","password":"…","ttl":86400,"uris":["turn:…"]}
//! ```
//!
//! Broker failures never leave this module as anything but a
//! [`BrokerError`]; the caller decides the fallback.

mod provider;


pub use provider::HttpCredentialProvider;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why minting failed.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The provider could not be reached or the connection broke.
    #[error("credential provider unreachable: {0}")]
    Network(#[source] reqwest::Error),

    #[error("credential provider timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered with a non-2xx status.
    #[error("credential provider returned HTTP {0}")]
    Status(u16),

    /// The provider answered 2xx with a body we cannot use.
    #[error("malformed credential provider response: {0}")]
    MalformedBody(String),

    #[error("failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What we ask the provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CredentialRequest {
    /// Requested lifetime in seconds.
    pub ttl: u32,
}

/// The `iceServers` object of a provider response.  All three fields are
/// required; empty strings and an empty list are valid values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IceServers {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

/// Credentials as handed to Matrix clients.  Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub username: String,
    pub password: String,
    pub ttl: u32,
    pub uris: Vec<String>,
}

impl CredentialResponse {
    /// Map the provider schema onto the client schema.
    pub fn from_ice_servers(ice: IceServers, ttl: u32) -> Self {
        Self {
            username: ice.username,
            password: ice.credential,
            ttl,
            uris: ice.urls,
        }
    }

    /// Serialized JSON body.
    pub fn to_body(&self) -> Result<Bytes, BrokerError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// A source of relay credentials.
#[async_trait]
pub trait CredentialProvider: fmt::Debug + Send + Sync {
    /// Provider name for log lines.
    fn name(&self) -> &str;

    /// Mint one credential.
    async fn issue(&self, request: CredentialRequest) -> Result<IceServers, BrokerError>;
}

/// Mints credentials with a fixed lifetime and renders the client body.
#[derive(Debug, Clone)]
pub struct CredentialBroker {
    provider: Arc<dyn CredentialProvider>,
    ttl: u32,
}

impl CredentialBroker {
    pub fn new(provider: Arc<dyn CredentialProvider>, ttl: u32) -> Self {
        Self { provider, ttl }
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the provider for a credential.
    pub async fn mint(&self) -> Result<CredentialResponse, BrokerError> {
        let ice = self
            .provider
            .issue(CredentialRequest { ttl: self.ttl })
            .await?;
        Ok(CredentialResponse::from_ice_servers(ice, self.ttl))
    }

    /// Mint a credential and render the replacement body.
    pub async fn substitute_body(&self) -> Result<Bytes, BrokerError> {
        self.mint().await?.to_body()
    }
}
