//! # cors-gate
//! Cross-Origin Resource Sharing (CORS) policy engine for `hyper`-based
//! HTTP services.
//!
//! The engine is configured once with an ordered list of access rule
//! groups, each scoping path-level resources to a set of allowed origins.
//! It answers preflight requests directly, decorates downstream responses
//! of actual cross-origin requests with `Access-Control-*` headers and
//! keeps `Vary` correct for shared caches.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use futures_util::FutureExt;
//! use hyper::Method;
//! use cors_gate::{Cors, HttpBody, Next};
//! use cors_gate::http::{Request, Response};
//!
//! # async fn docs() -> Result<(), cors_gate::Error> {
//! let cors = Cors::builder()
//!     .allow(|rules| rules
//!         .with_origins(["https://example.com"])
//!         .resource_with("/api/*", |r| r
//!             .with_methods([Method::GET, Method::POST])
//!             .with_headers(["x-domain-token"])))
//!     .build()?;
//!
//! let handler: Next = Arc::new(|_req| {
//!     async { Ok(Response::new(HttpBody::full("Hello, World!"))) }.boxed()
//! });
//!
//! let req = Request::builder()
//!     .uri("/api/users")
//!     .header("Origin", "https://example.com")
//!     .body(HttpBody::empty())
//!     .unwrap();
//!
//! let response = cors.process(req, &handler).await?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

pub mod cors;
pub mod error;
pub mod headers;
pub mod http;

pub use crate::{
    cors::{
        AllowedHeaders,
        Cors,
        CorsBuilder,
        CorsResult,
        GroupBuilder,
        MissReason,
        PathPattern,
        ResourceConfig
    },
    error::Error,
    http::{
        BoxBody,
        HttpBody,
        HttpRequest,
        HttpResponse,
        HttpResult,
        Next
    }
};
