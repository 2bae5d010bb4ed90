// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decides whether an origin response may have its body replaced.
//!
//! Only a `200` proves the homeserver authenticated the caller.  Anything
//! else is relayed as-is so relay credentials never reach an
//! unauthenticated client.

/// What to do with an origin response on the credential route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Replace the body with freshly minted credentials.
    Substitute,
    /// Relay the origin response unchanged.
    PassThrough,
}

/// Classify an origin status code.
pub fn classify(status: u16) -> Disposition {
    if status == 200 {
        Disposition::Substitute
    } else {
        Disposition::PassThrough
    }
}
