// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response framing headers.
//!
//! The origin's `Content-Length` and `Transfer-Encoding` describe the bytes
//! the origin sent, not the bytes we are about to send, so both are always
//! dropped.  A fully buffered body gets an exact `Content-Length`; a
//! streamed body gets neither and hyper picks the framing for the
//! connection (chunked on HTTP/1.1, DATA frames on HTTP/2).

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};

/// Remove every framing header, all values included.
pub fn strip_framing(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);
}

/// Headers for a body whose bytes are known up front.
pub fn fixed_length(mut headers: HeaderMap, body: &[u8]) -> HeaderMap {
    strip_framing(&mut headers);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers
}

/// Headers for a body relayed as a stream.
pub fn streamed(mut headers: HeaderMap) -> HeaderMap {
    strip_framing(&mut headers);
    headers
}
