//! Base HTTP tools

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, Empty, Full};
use std::sync::Arc;

use crate::error::Error;

// Re-exporting HTTP status codes, Request/Response and method/uri types from hyper
pub use hyper::{
    http::{Extensions, Method, Uri},
    Request,
    Response,
    StatusCode,
};

/// A type-erased response body
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, Error>;

/// An HTTP request flowing through the policy engine
pub type HttpRequest = Request<BoxBody>;

/// An HTTP response produced by the downstream handler or the policy engine
pub type HttpResponse = Response<BoxBody>;

/// A result of an HTTP request handling
pub type HttpResult = Result<HttpResponse, Error>;

/// Points to the downstream request handler
pub type Next = Arc<
    dyn Fn(HttpRequest) -> BoxFuture<'static, HttpResult>
    + Send
    + Sync
>;

/// Helpers for constructing [`BoxBody`] values
pub struct HttpBody;

impl HttpBody {
    /// Creates an empty body
    #[inline]
    pub fn empty() -> BoxBody {
        Empty::<Bytes>::new()
            .map_err(|never| match never {})
            .boxed()
    }

    /// Creates a body from a chunk of bytes
    #[inline]
    pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody {
        Full::from(chunk.into())
            .map_err(|never| match never {})
            .boxed()
    }
}

/// Percent-decodes a raw request path.
///
/// Returns `None` when the path is malformed: truncated or non-hex
/// percent escapes, non-UTF-8 decoded bytes, control characters,
/// or a missing leading slash.
pub(crate) fn decode_path(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while let Some(idx) = memchr::memchr(b'%', &bytes[pos..]) {
        let idx = pos + idx;
        decoded.extend_from_slice(&bytes[pos..idx]);
        let hi = hex_digit(*bytes.get(idx + 1)?)?;
        let lo = hex_digit(*bytes.get(idx + 2)?)?;
        decoded.push(hi << 4 | lo);
        pos = idx + 3;
    }
    decoded.extend_from_slice(&bytes[pos..]);

    let decoded = String::from_utf8(decoded).ok()?;
    if is_valid_path(&decoded) {
        Some(decoded)
    } else {
        None
    }
}

#[inline]
fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None
    }
}

#[inline]
fn is_valid_path(path: &str) -> bool {
    path.starts_with('/') && !path.bytes().any(|b| b < 0x20 || b == 0x7f)
}
