// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP credential provider (Cloudflare Calls TURN keys API).

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;

use super::{BrokerError, CredentialProvider, CredentialRequest, IceServers};
use crate::config::ProviderSettings;
use crate::core::ProxyError;

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(rename = "iceServers")]
    ice_servers: IceServers,
}

/// `POST {url}` with `Authorization: Bearer {api_token}` and `{"ttl": n}`.
#[derive(Clone)]
pub struct HttpCredentialProvider {
    client: reqwest::Client,
    url: String,
    api_token: String,
    timeout: Duration,
}

// Both the URL and the token are secrets.
impl fmt::Debug for HttpCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCredentialProvider")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpCredentialProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .build()
            .map_err(|e| ProxyError::Other(format!("failed to build provider client: {e}")))?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            api_token: settings.api_token.clone(),
            timeout: settings.timeout,
        })
    }

    async fn call(&self, request: CredentialRequest) -> Result<IceServers, BrokerError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| BrokerError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BrokerError::Network(e.without_url()))?;

        let parsed: GenerateResponse = serde_json::from_slice(&body)
            .map_err(|e| BrokerError::MalformedBody(e.to_string()))?;
        Ok(parsed.ice_servers)
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn issue(&self, request: CredentialRequest) -> Result<IceServers, BrokerError> {
        timeout(self.timeout, self.call(request))
            .await
            .map_err(|_| BrokerError::Timeout(self.timeout))?
    }
}
