//! Path pattern compilation

use regex::Regex;
use std::{fmt, sync::Arc};

use crate::error::Error;

/// A custom path-matching function
pub(crate) type PathMatcherFn = Arc<
    dyn Fn(&str) -> bool
    + Send
    + Sync
>;

/// A compiled matcher against raw request paths.
///
/// Path specifications are compiled once at configuration time:
/// * literal segments match exactly,
/// * `:name` matches one non-separator segment,
/// * `*` matches any substring,
/// * `/*` matches an optional slash followed by anything.
///
/// Matching is anchored to the whole path.
#[derive(Clone)]
pub enum PathPattern {
    /// A pattern compiled from a path specification string
    Compiled(Regex),
    /// An arbitrary caller-supplied matcher
    Custom(PathMatcherFn),
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compiled(regex) => f.debug_tuple("Compiled").field(&regex.as_str()).finish(),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl PathPattern {
    /// Compiles a path specification string into an anchored pattern
    ///
    /// # Example
    /// ```no_run
    /// use cors_gate::PathPattern;
    ///
    /// let pattern = PathPattern::compile("/api/:version/*")?;
    /// assert!(pattern.matches("/api/v1/users"));
    /// # Ok::<(), cors_gate::Error>(())
    /// ```
    pub fn compile(spec: &str) -> Result<Self, Error> {
        let mut pattern = String::with_capacity(spec.len() + 8);
        pattern.push('^');

        let bytes = spec.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    pattern.push_str("/?(.*)");
                    i += 2;
                }
                b'*' => {
                    pattern.push_str("(.*)");
                    i += 1;
                }
                b':' if bytes.get(i + 1).is_some_and(is_param_byte) => {
                    pattern.push_str("([^/?&#]+)");
                    i += 1;
                    while i < bytes.len() && is_param_byte(&bytes[i]) {
                        i += 1;
                    }
                }
                _ => match spec[i..].chars().next() {
                    Some(ch) => {
                        push_escaped(&mut pattern, ch);
                        i += ch.len_utf8();
                    }
                    None => break,
                },
            }
        }

        pattern.push('$');
        Ok(Self::Compiled(Regex::new(&pattern)?))
    }

    /// Returns `true` if the whole `path` matches the pattern
    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Compiled(regex) => regex.is_match(path),
            Self::Custom(matcher) => matcher(path),
        }
    }
}

#[inline]
fn is_param_byte(byte: &u8) -> bool {
    byte.is_ascii_alphanumeric() || *byte == b'_'
}

#[inline]
fn push_escaped(pattern: &mut String, ch: char) {
    if ch.is_ascii() && !ch.is_ascii_alphanumeric() {
        pattern.push('\\');
    }
    pattern.push(ch);
}
