//! CORS policy engine
//!
//! Evaluates cross-origin requests against an ordered list of access rule
//! groups, answers preflight requests directly and decorates downstream
//! responses of actual requests with the appropriate `Access-Control-*`
//! headers.

use std::str::FromStr;
use tracing::debug;

use crate::{
    headers::{
        merge_vary,
        ACCESS_CONTROL_REQUEST_METHOD,
        CONTENT_LENGTH,
        CONTENT_TYPE,
        HeaderMap,
        HeaderName,
        HeaderValue,
        ORIGIN,
        X_ORIGIN
    },
    http::{decode_path, HttpBody, HttpRequest, HttpResult, Method, Next, Response, StatusCode}
};

use self::{
    group::ResourceGroup,
    resource::{Resource, FILE_ORIGIN}
};

pub mod builder;
pub mod group;
pub mod pattern;
pub mod resource;
pub mod result;

pub use builder::{CorsBuilder, GroupBuilder, ResourceConfig};
pub use pattern::PathPattern;
pub use resource::AllowedHeaders;
pub use result::{CorsResult, MissReason};

const NULL_ORIGIN: &str = "null";
const DEBUG_HEADER_PREFIX: &str = "x-cors-original-";
const DEFAULT_VARY: &str = "Origin";
const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain");
const ZERO: HeaderValue = HeaderValue::from_static("0");

/// The CORS policy engine: an immutable, ordered list of access rule groups.
///
/// Built once with [`Cors::builder`] and shared across requests; evaluation
/// never mutates the engine, so a single instance can be wrapped in an `Arc`
/// and cloned into every connection task.
///
/// # Example
/// ```no_run
/// use cors_gate::Cors;
/// use hyper::Method;
///
/// let cors = Cors::builder()
///     .allow(|rules| rules
///         .with_origins(["https://example.com"])
///         .resource_with("/api/*", |r| r
///             .with_methods([Method::GET, Method::POST])))
///     .build()?;
/// # Ok::<(), cors_gate::Error>(())
/// ```
#[derive(Debug)]
pub struct Cors {
    pub(crate) groups: Vec<ResourceGroup>,
    pub(crate) debug: bool,
}

impl Cors {
    /// Creates a new [`CorsBuilder`]
    #[inline]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    /// Evaluates a request against the configured rules.
    ///
    /// Preflight requests (`OPTIONS` carrying
    /// `Access-Control-Request-Method`) are answered directly and never
    /// reach `next`. Every other request is forwarded to `next` and its
    /// response is decorated: computed `Access-Control-*` headers are
    /// merged in without overriding values the downstream handler already
    /// set, and the `Vary` header is folded for any CORS-configured path.
    ///
    /// A [`CorsResult`] describing the evaluation is attached to the
    /// response extensions.
    pub async fn process(&self, req: HttpRequest, next: &Next) -> HttpResult {
        let origin = normalize_origin(&req);
        if let Some(origin) = &origin {
            if is_preflight(&req) {
                return self.preflight(&req, origin);
            }
        }
        self.actual(req, next, origin).await
    }

    /// Answers a preflight request.
    ///
    /// Both approvals and denials are `200 OK` with an empty body; a denial
    /// simply carries no `Access-Control-*` headers, which makes the browser
    /// block the actual request. A malformed request path is the one hard
    /// failure and is answered with `400 Bad Request`.
    fn preflight(&self, req: &HttpRequest, origin: &str) -> HttpResult {
        let mut response = Response::new(HttpBody::empty());

        let Some(path) = decode_path(req.uri().path()) else {
            debug!(path = req.uri().path(), "rejecting preflight with malformed path");
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        };

        let outcome = self
            .evaluate(req, origin, &path)
            .and_then(|resource| resource.preflight_headers(req, origin));

        match outcome {
            Ok(headers) => {
                debug!(origin, path, "approved preflight");
                *response.headers_mut() = headers;
                response.headers_mut().insert(CONTENT_TYPE, TEXT_PLAIN);
                response.headers_mut().insert(CONTENT_LENGTH, ZERO);
                response.extensions_mut().insert(CorsResult::hit(true));
            }
            Err(reason) => {
                debug!(origin, path, ?reason, "denied preflight");
                response.extensions_mut().insert(CorsResult::miss(true, reason));
            }
        }
        Ok(response)
    }

    /// Forwards an actual request downstream and decorates the response
    async fn actual(
        &self,
        req: HttpRequest,
        next: &Next,
        origin: Option<String>,
    ) -> HttpResult {
        let path = decode_path(req.uri().path());
        let (result, cors_headers) = match (&origin, &path) {
            (Some(origin), Some(path)) => match self.evaluate(&req, origin, path) {
                Ok(resource) => {
                    debug!(origin, path, "allowed cross-origin request");
                    (CorsResult::hit(false), Some(resource.actual_headers(origin)))
                }
                Err(reason) => {
                    debug!(origin, path, ?reason, "unmatched cross-origin request");
                    (CorsResult::miss(false, reason), None)
                }
            },
            (Some(_), None) => (CorsResult::miss(false, MissReason::NoPathMatch), None),
            (None, _) => (CorsResult::miss(false, MissReason::NoOriginMatch), None),
        };
        let vary = path.as_deref().and_then(|path| self.vary_headers(path));

        let mut response = next(req).await?;

        if let Some(headers) = cors_headers {
            self.merge_headers(response.headers_mut(), &headers);
        }
        if let Some(vary) = vary {
            merge_vary(response.headers_mut(), &vary);
        }
        response.extensions_mut().insert(result);
        Ok(response)
    }

    /// Resolves the resource for an origin and path.
    ///
    /// Groups are walked in declaration order; the first group whose origin
    /// rules admit the request origin is authoritative, even when a later
    /// group would also match the path.
    fn evaluate<'a>(
        &'a self,
        req: &HttpRequest,
        origin: &str,
        path: &str,
    ) -> Result<&'a Resource, MissReason> {
        let group = self.groups
            .iter()
            .find(|g| g.allows_origin(origin, req))
            .ok_or(MissReason::NoOriginMatch)?;
        group
            .find_resource(path, req)
            .ok_or(MissReason::NoPathMatch)
    }

    /// Returns the `Vary` header names for a CORS-configured path.
    ///
    /// Caches keyed without `Vary: Origin` would replay one origin's
    /// `Access-Control-Allow-Origin` to every other origin, so any path a
    /// resource claims contributes its vary set regardless of whether the
    /// current request's origin matched.
    fn vary_headers(&self, path: &str) -> Option<Vec<String>> {
        self.groups
            .iter()
            .flat_map(|g| g.resources.iter())
            .find(|r| r.matches_path(path))
            .map(|r| r.vary
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_VARY.to_owned()]))
    }

    /// Merges computed CORS headers into the downstream response.
    ///
    /// A header the downstream handler already set wins; in debug mode the
    /// shadowed value is recorded under `x-cors-original-<name>`.
    fn merge_headers(&self, response: &mut HeaderMap, computed: &HeaderMap) {
        for (name, value) in computed {
            if !response.contains_key(name) {
                response.insert(name.clone(), value.clone());
            } else if self.debug {
                let debug_name = format!("{DEBUG_HEADER_PREFIX}{name}");
                if let Ok(debug_name) = HeaderName::from_str(&debug_name) {
                    response.insert(debug_name, value.clone());
                }
            }
        }
    }
}

/// Reads the request origin from `Origin`, falling back to `X-Origin`.
///
/// The literal `null` origin sent for local files is normalized to
/// `file://` so rules can target it explicitly.
fn normalize_origin(req: &HttpRequest) -> Option<String> {
    let value = req.headers()
        .get(ORIGIN)
        .or_else(|| req.headers().get(X_ORIGIN))?;
    let origin = value.to_str().ok()?;
    if origin.is_empty() {
        None
    } else if origin == NULL_ORIGIN {
        Some(FILE_ORIGIN.to_owned())
    } else {
        Some(origin.to_owned())
    }
}

#[inline]
fn is_preflight(req: &HttpRequest) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}
