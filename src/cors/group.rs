//! Origin-scoped groups of access rules

use regex::Regex;
use std::{fmt, sync::Arc};

use crate::http::HttpRequest;
use super::resource::Resource;

/// A dynamic origin-matching function taking the origin and the full request
pub(crate) type OriginPredicate = Arc<
    dyn Fn(&str, &HttpRequest) -> bool
    + Send
    + Sync
>;

/// A single origin-matching rule
#[derive(Clone)]
pub enum OriginMatcher {
    /// Exact string comparison against the request origin
    Literal(String),
    /// Regex pattern matching
    Pattern(Regex),
    /// Custom predicate over the origin and the request
    Predicate(OriginPredicate),
}

impl fmt::Debug for OriginMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(origin) => f.debug_tuple("Literal").field(origin).finish(),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Self::Predicate(_) => write!(f, "Predicate(<fn>)"),
        }
    }
}

impl OriginMatcher {
    /// Returns `true` if the rule matches the request origin
    #[inline]
    pub(crate) fn matches(&self, origin: &str, req: &HttpRequest) -> bool {
        match self {
            Self::Literal(literal) => literal == origin,
            Self::Pattern(regex) => regex.is_match(origin),
            Self::Predicate(predicate) => predicate(origin, req),
        }
    }
}

/// Expands a literal origin specification into the matchers it implies.
///
/// Bare hostnames carry no scheme and are matched for both `http://` and
/// `https://`; scheme-qualified values (including non-HTTP schemes such as
/// `file://` or `content://`) pass through unchanged. Empty strings expand
/// to nothing.
pub(crate) fn expand_literal(origin: &str) -> Vec<OriginMatcher> {
    if origin.is_empty() {
        Vec::new()
    } else if origin.contains("://") {
        vec![OriginMatcher::Literal(origin.to_owned())]
    } else {
        vec![
            OriginMatcher::Literal(format!("http://{origin}")),
            OriginMatcher::Literal(format!("https://{origin}")),
        ]
    }
}

/// An ordered group of [`Resource`]s sharing one origin-matching rule set.
///
/// A group is public when its origins were configured with the `*` wildcard;
/// a public group matches any origin and its resources must not require
/// credentials.
#[derive(Debug)]
pub struct ResourceGroup {
    pub(crate) matchers: Vec<OriginMatcher>,
    pub(crate) public: bool,
    pub(crate) resources: Vec<Resource>,
}

impl ResourceGroup {
    /// Returns `true` if this group's origin rules admit the request origin
    #[inline]
    pub(crate) fn allows_origin(&self, origin: &str, req: &HttpRequest) -> bool {
        self.public || self.matchers.iter().any(|m| m.matches(origin, req))
    }

    /// Finds the first resource, in declaration order, matching the path
    /// and its optional predicate
    #[inline]
    pub(crate) fn find_resource(&self, path: &str, req: &HttpRequest) -> Option<&Resource> {
        self.resources.iter().find(|r| r.matches(path, req))
    }
}
