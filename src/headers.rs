//! Tools for HTTP headers

// Re-exporting HeaderMap, HeaderValue and the CORS headers from hyper
pub use hyper::{
    header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS,
        ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_EXPOSE_HEADERS,
        ACCESS_CONTROL_MAX_AGE,
        ACCESS_CONTROL_REQUEST_HEADERS,
        ACCESS_CONTROL_REQUEST_METHOD,
        CONTENT_LENGTH,
        CONTENT_TYPE,
        ORIGIN,
        VARY
    },
    http::{HeaderMap, HeaderName, HeaderValue}
};

const WILDCARD_STR: &str = "*";
const SEPARATOR: &str = ", ";

/// Alternative origin header honored when `Origin` is absent
pub const X_ORIGIN: &str = "x-origin";

/// Folds `names` into the response `Vary` header, preserving any value
/// already present and de-duplicating case-insensitively.
///
/// A pre-existing `Vary: *` is left untouched.
pub(crate) fn merge_vary(headers: &mut HeaderMap, names: &[String]) {
    let existing = headers
        .get(VARY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let mut parts = existing
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();

    if parts.iter().any(|p| p == WILDCARD_STR) {
        return;
    }

    for name in names {
        if !parts.iter().any(|p| p.eq_ignore_ascii_case(name)) {
            parts.push(name.clone());
        }
    }

    if let Ok(value) = HeaderValue::from_str(&parts.join(SEPARATOR)) {
        headers.insert(VARY, value);
    }
}
