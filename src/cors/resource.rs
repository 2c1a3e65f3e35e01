//! Path-scoped access rules

use hyper::Method;
use std::{fmt, sync::Arc};

use crate::{
    headers::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS,
        ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_EXPOSE_HEADERS,
        ACCESS_CONTROL_MAX_AGE,
        ACCESS_CONTROL_REQUEST_HEADERS,
        ACCESS_CONTROL_REQUEST_METHOD,
        HeaderMap,
        HeaderValue
    },
    http::HttpRequest
};

use super::{pattern::PathPattern, result::MissReason};

/// Request headers every CORS resource accepts regardless of configuration
const CORS_SIMPLE_HEADERS: [&str; 4] = [
    "accept",
    "accept-language",
    "content-language",
    "content-type",
];

/// Default preflight cache lifetime in seconds
pub(crate) const DEFAULT_MAX_AGE: u64 = 7200;

pub(crate) const FILE_ORIGIN: &str = "file://";

const WILDCARD_VALUE: HeaderValue = HeaderValue::from_static("*");
const NULL_ORIGIN_VALUE: HeaderValue = HeaderValue::from_static("null");
const TRUE_VALUE: HeaderValue = HeaderValue::from_static("true");
const SEPARATOR: &str = ", ";

/// A conditional predicate evaluated against the request before a resource matches
pub(crate) type ResourcePredicate = Arc<
    dyn Fn(&HttpRequest) -> bool
    + Send
    + Sync
>;

/// Request headers a resource allows in preflight validation.
///
/// The CORS-simple headers (`accept`, `accept-language`, `content-language`,
/// `content-type`) are always admitted on top of the configured list.
#[derive(Debug, Clone)]
pub enum AllowedHeaders {
    /// Any request header is allowed
    Any,
    /// Only the listed headers (lowercase) and the CORS-simple headers
    List(Vec<String>),
}

impl Default for AllowedHeaders {
    #[inline]
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl AllowedHeaders {
    /// Validates a comma-separated `Access-Control-Request-Headers` value
    fn allows(&self, requested: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(allowed) => requested
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .all(|header| {
                    let header = header.to_ascii_lowercase();
                    CORS_SIMPLE_HEADERS.contains(&header.as_str())
                        || allowed.iter().any(|a| *a == header)
                }),
        }
    }
}

/// One path-scoped access rule: the path pattern, allowed methods and
/// request headers, exposed response headers, preflight cache lifetime,
/// credentials flag and optional conditional predicate.
///
/// Resources are built once by [`CorsBuilder`](crate::CorsBuilder) and are
/// immutable afterwards.
pub struct Resource {
    pub(crate) pattern: PathPattern,
    pub(crate) methods: Vec<Method>,
    pub(crate) headers: AllowedHeaders,
    pub(crate) expose: Option<Vec<String>>,
    pub(crate) max_age: u64,
    pub(crate) credentials: bool,
    pub(crate) vary: Option<Vec<String>>,
    pub(crate) predicate: Option<ResourcePredicate>,
    pub(crate) public: bool,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("headers", &self.headers)
            .field("expose", &self.expose)
            .field("max_age", &self.max_age)
            .field("credentials", &self.credentials)
            .field("vary", &self.vary)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .field("public", &self.public)
            .finish()
    }
}

impl Resource {
    /// Returns `true` if the path pattern matches, ignoring the predicate
    #[inline]
    pub(crate) fn matches_path(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }

    /// Returns `true` if the path pattern matches and the predicate, if any,
    /// is satisfied by the request
    #[inline]
    pub(crate) fn matches(&self, path: &str, req: &HttpRequest) -> bool {
        self.matches_path(path) && self.predicate.as_ref().map_or(true, |p| p(req))
    }

    /// Computes the response headers for an actual (non-preflight)
    /// cross-origin request
    pub(crate) fn actual_headers(&self, origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin(origin));
        if let Some(methods) = self.allow_methods() {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, methods);
        }
        if let Some(expose) = self.expose_headers() {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, expose);
        }
        if let Some(max_age) = self.max_age() {
            headers.insert(ACCESS_CONTROL_MAX_AGE, max_age);
        }
        if self.credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, TRUE_VALUE);
        }
        headers
    }

    /// Validates a preflight request against this resource.
    ///
    /// On success returns the preflight response headers; on failure returns
    /// the miss reason, which the engine records without raising an error.
    pub(crate) fn preflight_headers(
        &self,
        req: &HttpRequest,
        origin: &str,
    ) -> Result<HeaderMap, MissReason> {
        let method = req.headers()
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .ok_or(MissReason::NoMethodHeader)?;
        let method = method.to_str().map_err(|_| MissReason::MethodNotAllowed)?;
        if !self.allows_method(method) {
            return Err(MissReason::MethodNotAllowed);
        }

        let requested_headers = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS);
        if let Some(requested) = requested_headers {
            let requested = requested
                .to_str()
                .map_err(|_| MissReason::HeaderNotAllowed)?;
            if !self.headers.allows(requested) {
                return Err(MissReason::HeaderNotAllowed);
            }
        }

        let mut headers = self.actual_headers(origin);
        if let Some(requested) = requested_headers {
            // Echo the requested headers back verbatim rather than
            // advertising the full configured allow-list
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        Ok(headers)
    }

    /// Creates a value for the [`Access-Control-Allow-Origin`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Reference/Headers/Access-Control-Allow-Origin)
    /// HTTP header
    fn allow_origin(&self, origin: &str) -> HeaderValue {
        if self.public {
            WILDCARD_VALUE
        } else if origin == FILE_ORIGIN {
            NULL_ORIGIN_VALUE
        } else {
            HeaderValue::from_str(origin).unwrap_or(NULL_ORIGIN_VALUE)
        }
    }

    /// Creates a value for the [`Access-Control-Allow-Methods`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Reference/Headers/Access-Control-Allow-Methods)
    /// HTTP header
    fn allow_methods(&self) -> Option<HeaderValue> {
        let methods = self.methods
            .iter()
            .map(|m| m.as_str().to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(SEPARATOR);
        HeaderValue::from_str(&methods).ok()
    }

    /// Creates a value for the [`Access-Control-Expose-Headers`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Reference/Headers/Access-Control-Expose-Headers)
    /// HTTP header
    fn expose_headers(&self) -> Option<HeaderValue> {
        match &self.expose {
            None => Some(HeaderValue::from_static("")),
            Some(expose) => HeaderValue::from_str(&expose.join(SEPARATOR)).ok(),
        }
    }

    /// Creates a value for the [`Access-Control-Max-Age`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Reference/Headers/Access-Control-Max-Age)
    /// HTTP header
    fn max_age(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(itoa::Buffer::new().format(self.max_age)).ok()
    }

    fn allows_method(&self, method: &str) -> bool {
        self.methods
            .iter()
            .any(|m| m.as_str().eq_ignore_ascii_case(method))
    }
}
