// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-origin access for browser clients.
//!
//! Only requests that carry an `Origin` header are affected.  Preflights are
//! answered locally; every other response gets the request origin echoed
//! back unless the origin server already set its own policy.

use reqwest::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
    ORIGIN, VARY,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};

const ALLOWED_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

impl CorsConfig {
    /// The `Origin` of a request, if CORS handling applies to it.
    pub fn request_origin(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        if !self.enabled {
            return None;
        }
        headers.get(ORIGIN).cloned()
    }

    /// Whether this request is a preflight that should be answered locally.
    pub fn is_preflight(&self, method: &Method, headers: &HeaderMap) -> bool {
        self.enabled
            && method == Method::OPTIONS
            && headers.contains_key(ORIGIN)
            && headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// Headers for a locally answered preflight.
    pub fn preflight_headers(&self, origin: &HeaderValue, request_headers: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        if let Some(requested) = request_headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        headers.append(VARY, HeaderValue::from_static("Origin"));
        headers
    }

    /// Echo `origin` on a response unless it already carries a policy.
    pub fn decorate(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        if headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            return;
        }
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
}
