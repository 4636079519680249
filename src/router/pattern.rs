//! Path patterns.
//!
//! A pattern is a `/`-separated list of segments. A segment starting with `:`
//! is dynamic: it matches exactly one non-empty path segment and binds it
//! under its name. Every other segment must match literally.
//!
//! ```text
//! /users          matches  /users
//! /users/:id      matches  /users/7        binds id=7
//! /users/:id      rejects  /users/         (empty segment)
//! /users/:id      rejects  /users/7/posts  (segment count differs)
//! ```

use crate::router::error::RouterError;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Dynamic(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses a pattern such as `/users/:id`.
    pub fn parse(raw: &str) -> Result<Self, RouterError> {
        let invalid = |reason| RouterError::InvalidPattern {
            pattern: raw.to_string(),
            reason,
        };

        let parts = split_path(raw).ok_or_else(|| invalid("pattern must start with '/'"))?;

        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            if part.chars().any(char::is_whitespace) {
                return Err(invalid("pattern must not contain whitespace"));
            }
            let segment = match part.strip_prefix(':') {
                Some("") => return Err(invalid("dynamic segment needs a name")),
                Some(name) => {
                    let taken = segments
                        .iter()
                        .any(|s| matches!(s, Segment::Dynamic(n) if n == name));
                    if taken {
                        return Err(invalid("dynamic segment name used twice"));
                    }
                    Segment::Dynamic(name.to_string())
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches `path` against this pattern, returning the dynamic bindings in
    /// pattern order.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts = split_path(path)?;
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Dynamic(name) if !part.is_empty() => {
                    params.push((name.clone(), part.to_string()));
                }
                _ => return None,
            }
        }
        Some(params)
    }

    /// Orders patterns by specificity.
    ///
    /// Segment kinds are compared left to right; at the first position where
    /// one pattern has a literal and the other a dynamic segment, the literal
    /// one is more specific. This is the longest-literal-prefix rule.
    pub fn specificity_cmp(&self, other: &Pattern) -> Ordering {
        for (ours, theirs) in self.segments.iter().zip(&other.segments) {
            match (ours, theirs) {
                (Segment::Literal(_), Segment::Dynamic(_)) => return Ordering::Greater,
                (Segment::Dynamic(_), Segment::Literal(_)) => return Ordering::Less,
                _ => {}
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }

    /// Returns true if both patterns match exactly the same paths, i.e. they
    /// differ at most in the names of their dynamic segments.
    pub fn same_shape(&self, other: &Pattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Dynamic(_), Segment::Dynamic(_)) => true,
                    _ => false,
                })
    }
}

/// Splits an absolute path into its segments. `/` has no segments.
fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        Some(Vec::new())
    } else {
        Some(rest.split('/').collect())
    }
}
