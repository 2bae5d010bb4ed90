// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-way request dispatch.
//!
//! A `GET` whose path matches [`TURN_SERVER_PATTERN`] gets credential
//! substitution; everything else is forwarded untouched.  `*` stands for
//! "one or more characters, not starting with `/`" and may span segments.

#[cfg(test)]
mod tests;

use regex::Regex;
use reqwest::Method;

use crate::core::ProxyError;

/// Path of the Matrix client API endpoint that hands out TURN servers.
pub const TURN_SERVER_PATTERN: &str = "/*/voip/turnServer";

/// Which behaviour applies to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Credential-bearing route.  `prefix` is the matched `*` portion,
    /// e.g. `_matrix/client/v3`.
    TurnServer { prefix: String },
    /// Anything else.
    Forward,
}

impl Route {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Route::TurnServer { .. } => "turn_server",
            Route::Forward => "forward",
        }
    }
}

/// Matches requests against the credential route.
#[derive(Debug, Clone)]
pub struct RouteDispatcher {
    regex: Regex,
}

impl RouteDispatcher {
    /// Dispatcher for the standard Matrix TURN endpoint.
    pub fn new() -> Result<Self, ProxyError> {
        let regex = Regex::new(&pattern_to_regex(TURN_SERVER_PATTERN)).map_err(|e| {
            ProxyError::RoutingError(format!("invalid route pattern '{TURN_SERVER_PATTERN}': {e}"))
        })?;

        Ok(Self { regex })
    }

    /// Pick the behaviour for a request.
    pub fn dispatch(&self, method: &Method, path: &str) -> Route {
        if method != Method::GET {
            return Route::Forward;
        }

        match self.regex.captures(path) {
            Some(captures) => Route::TurnServer {
                prefix: captures
                    .get(1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            },
            None => Route::Forward,
        }
    }
}

/// Convert a path pattern to an anchored regex.
fn pattern_to_regex(pattern: &str) -> String {
    let mut regex_pattern = String::from("^");

    for c in pattern.chars() {
        match c {
            '*' => regex_pattern.push_str("([^/].*)"),
            '.' | '^' | '$' | '|' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '\\' => {
                regex_pattern.push('\\');
                regex_pattern.push(c);
            }
            _ => regex_pattern.push(c),
        }
    }

    regex_pattern.push('$');
    regex_pattern
}
