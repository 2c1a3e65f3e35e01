//! Builder API producing the immutable, validated rule list

use hyper::Method;
use regex::Regex;
use std::sync::Arc;

use crate::{error::Error, http::HttpRequest};
use super::{
    group::{expand_literal, OriginMatcher, ResourceGroup},
    pattern::PathPattern,
    resource::{AllowedHeaders, Resource, DEFAULT_MAX_AGE},
    Cors,
};

const ANY_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Builds a [`Cors`] policy engine from an ordered sequence of access rule
/// groups.
///
/// Groups are evaluated in declaration order; the first group whose origin
/// rules match the request origin is used for resource lookup.
///
/// # Example
/// ```no_run
/// use cors_gate::Cors;
/// use hyper::Method;
///
/// let cors = Cors::builder()
///     .allow(|rules| rules
///         .with_origins(["https://example.com", "example.net"])
///         .resource_with("/api/*", |r| r
///             .with_methods([Method::GET, Method::POST])
///             .with_headers(["x-domain-token"])))
///     .allow(|rules| rules
///         .with_any_origin()
///         .resource("/public/*"))
///     .build()?;
/// # Ok::<(), cors_gate::Error>(())
/// ```
#[derive(Default)]
pub struct CorsBuilder {
    groups: Vec<GroupBuilder>,
    debug: bool,
}

impl CorsBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enables recording of downstream-overridden header values as
    /// `x-cors-original-*` response headers
    ///
    /// Default value: `false`
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Appends a group of access rules sharing one origin-matching rule set
    ///
    /// # Example
    /// ```no_run
    /// use cors_gate::Cors;
    ///
    /// let cors = Cors::builder()
    ///     .allow(|rules| rules
    ///         .with_origins(["http://localhost:3000"])
    ///         .resource("/"))
    ///     .build()?;
    /// # Ok::<(), cors_gate::Error>(())
    /// ```
    pub fn allow<F>(mut self, config: F) -> Self
    where
        F: FnOnce(GroupBuilder) -> GroupBuilder
    {
        self.groups.push(config(GroupBuilder::new()));
        self
    }

    /// Validates the configured rules and builds the engine.
    ///
    /// Fails with a configuration [`Error`] when a path or origin pattern
    /// does not compile, or when a resource requests credentials inside a
    /// public (`*` origin) group. Broken rules must abort startup rather
    /// than silently degrade.
    pub fn build(self) -> Result<Cors, Error> {
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in self.groups {
            groups.push(group.build()?);
        }
        Ok(Cors { groups, debug: self.debug })
    }
}

/// Configures one access rule group: its origin rules and resources
pub struct GroupBuilder {
    matchers: Vec<OriginMatcher>,
    public: bool,
    resources: Vec<ResourceConfig>,
    invalid_pattern: Option<regex::Error>,
}

impl GroupBuilder {
    #[inline]
    fn new() -> Self {
        Self {
            matchers: Vec::new(),
            public: false,
            resources: Vec::new(),
            invalid_pattern: None,
        }
    }

    /// Adds literal allowed origins.
    ///
    /// Bare hostnames match both `http://` and `https://`; the `*` wildcard
    /// marks the whole group public (any origin).
    pub fn with_origins<T, S>(mut self, origins: T) -> Self
    where
        T: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        for origin in origins {
            let origin = origin.as_ref();
            if origin == "*" {
                self.public = true;
            } else {
                self.matchers.extend(expand_literal(origin));
            }
        }
        self
    }

    /// Marks the group public: any origin is allowed and
    /// `Access-Control-Allow-Origin` is answered with `*`
    pub fn with_any_origin(mut self) -> Self {
        self.public = true;
        self
    }

    /// Adds an origin rule matching a regex pattern.
    ///
    /// An invalid pattern fails [`CorsBuilder::build`], never a request.
    pub fn with_origin_pattern(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => self.matchers.push(OriginMatcher::Pattern(regex)),
            Err(err) => self.invalid_pattern = self.invalid_pattern.or(Some(err)),
        }
        self
    }

    /// Adds an origin rule evaluated by a custom predicate over the origin
    /// and the request
    pub fn with_origin_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &HttpRequest) -> bool + Send + Sync + 'static
    {
        self.matchers.push(OriginMatcher::Predicate(Arc::new(predicate)));
        self
    }

    /// Adds a resource with default options: `GET` only, CORS-simple request
    /// headers, no exposed headers, 7200 seconds max-age, no credentials
    pub fn resource(mut self, path: &str) -> Self {
        self.resources.push(ResourceConfig::new(path));
        self
    }

    /// Adds a resource with custom options
    ///
    /// # Example
    /// ```no_run
    /// use cors_gate::Cors;
    /// use hyper::Method;
    ///
    /// let cors = Cors::builder()
    ///     .allow(|rules| rules
    ///         .with_origins(["http://localhost:3000"])
    ///         .resource_with("/upload", |r| r
    ///             .with_methods([Method::PUT, Method::POST])
    ///             .with_any_header()
    ///             .with_max_age(300)))
    ///     .build()?;
    /// # Ok::<(), cors_gate::Error>(())
    /// ```
    pub fn resource_with<F>(mut self, path: &str, config: F) -> Self
    where
        F: FnOnce(ResourceConfig) -> ResourceConfig
    {
        self.resources.push(config(ResourceConfig::new(path)));
        self
    }

    fn build(self) -> Result<ResourceGroup, Error> {
        if let Some(err) = self.invalid_pattern {
            return Err(err.into());
        }
        let mut resources = Vec::with_capacity(self.resources.len());
        for resource in self.resources {
            resources.push(resource.build(self.public)?);
        }
        Ok(ResourceGroup {
            matchers: self.matchers,
            public: self.public,
            resources,
        })
    }
}

/// Configures one path-scoped access rule
pub struct ResourceConfig {
    path: String,
    matcher: Option<super::pattern::PathMatcherFn>,
    methods: Vec<Method>,
    headers: AllowedHeaders,
    expose: Option<Vec<String>>,
    max_age: u64,
    credentials: bool,
    vary: Option<Vec<String>>,
    predicate: Option<super::resource::ResourcePredicate>,
}

impl ResourceConfig {
    #[inline]
    fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            matcher: None,
            methods: vec![Method::GET],
            headers: AllowedHeaders::default(),
            expose: None,
            max_age: DEFAULT_MAX_AGE,
            credentials: false,
            vary: None,
            predicate: None,
        }
    }

    /// Configures the allowed HTTP methods
    ///
    /// Default value: `GET`
    pub fn with_methods<T>(mut self, methods: T) -> Self
    where
        T: IntoIterator<Item = Method>
    {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Configures the resource to allow any common HTTP method
    pub fn with_any_method(mut self) -> Self {
        self.methods = ANY_METHODS.to_vec();
        self
    }

    /// Configures the allowed request headers, compared case-insensitively.
    ///
    /// The CORS-simple headers are always allowed on top of this list.
    ///
    /// Default value: CORS-simple headers only
    pub fn with_headers<T, S>(mut self, headers: T) -> Self
    where
        T: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        let headers = headers
            .into_iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        self.headers = AllowedHeaders::List(headers);
        self
    }

    /// Configures the resource to allow any request header
    pub fn with_any_header(mut self) -> Self {
        self.headers = AllowedHeaders::Any;
        self
    }

    /// Configures the response headers exposed to the browser via
    /// `Access-Control-Expose-Headers`
    ///
    /// Default value: none
    pub fn with_expose_headers<T, S>(mut self, headers: T) -> Self
    where
        T: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        self.expose = Some(headers
            .into_iter()
            .map(|h| h.as_ref().to_owned())
            .collect());
        self
    }

    /// Configures the `Access-Control-Max-Age` value in seconds
    ///
    /// Default value: 7200 seconds (2 hours)
    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age = secs;
        self
    }

    /// Configures whether to allow credentialed requests.
    ///
    /// Rejected at [`CorsBuilder::build`] when the owning group is public.
    ///
    /// Default value: `false`
    pub fn with_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    /// Configures the header names folded into the response `Vary` header
    /// in place of the default `Origin`
    pub fn with_vary<T, S>(mut self, headers: T) -> Self
    where
        T: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        self.vary = Some(headers
            .into_iter()
            .map(|h| h.as_ref().to_owned())
            .collect());
        self
    }

    /// Configures a conditional predicate; the resource only matches
    /// requests the predicate approves
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HttpRequest) -> bool + Send + Sync + 'static
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Replaces the path specification with an arbitrary matcher function
    pub fn with_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static
    {
        self.matcher = Some(Arc::new(matcher));
        self
    }

    fn build(self, public: bool) -> Result<Resource, Error> {
        if public && self.credentials {
            return Err(Error::config_error(
                "CORS error: `credentials: true` cannot be combined \
                with a public (`*`) origin"
            ));
        }

        let pattern = match self.matcher {
            Some(matcher) => PathPattern::Custom(matcher),
            None => PathPattern::compile(&self.path)?,
        };

        Ok(Resource {
            pattern,
            methods: self.methods,
            headers: self.headers,
            expose: self.expose,
            max_age: self.max_age,
            credentials: self.credentials,
            vary: self.vary,
            predicate: self.predicate,
            public,
        })
    }
}
