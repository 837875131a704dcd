//! Static route classification
//!
//! Patterns are path prefixes matched on segment boundaries. A segment
//! written as `:name` or `[name]` matches any single non-empty segment, and
//! the root pattern `/` only matches the root itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::RoutesConfig;
use crate::error::{CoreError, CoreResult};

/// Access class of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteClass {
    #[default]
    Public,
    Protected,
    /// Pages only meaningful to signed-out users (login, signup)
    AuthOnly,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Protected => write!(f, "protected"),
            Self::AuthOnly => write!(f, "auth-only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// Parsed path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> CoreResult<Self> {
        if !pattern.starts_with('/') {
            return Err(CoreError::invalid_route(pattern, "must start with '/'"));
        }

        let segments = split_segments(pattern)
            .map(|segment| {
                let is_param = segment.starts_with(':')
                    || (segment.starts_with('[') && segment.ends_with(']'));
                if is_param {
                    if segment.len() < 2 || segment == "[]" {
                        return Err(CoreError::invalid_route(pattern, "empty parameter name"));
                    }
                    Ok(Segment::Param)
                } else {
                    Ok(Segment::Literal(segment.to_string()))
                }
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `path` equals this pattern or lies below it
    pub fn matches(&self, path: &str) -> bool {
        let path = request_path(path);
        let mut path_segments = split_segments(&path);

        if self.segments.is_empty() {
            return path_segments.next().is_none();
        }

        self.segments.iter().all(|expected| {
            path_segments.next().is_some_and(|actual| match expected {
                Segment::Literal(literal) => literal == actual,
                Segment::Param => true,
            })
        })
    }
}

impl FromStr for RoutePattern {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Path component of a URL or path, without query or fragment.
///
/// Absolute URLs are reduced to their path; relative input is cut at the
/// first `?` or `#`.
pub fn request_path(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if parsed.has_host() {
            return parsed.path().to_string();
        }
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Compiled route classification table
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    auth_only: Vec<RoutePattern>,
    protected: Vec<RoutePattern>,
    public: Vec<RoutePattern>,
    fallback: RouteClass,
}

impl RouteTable {
    pub fn from_config(config: &RoutesConfig) -> CoreResult<Self> {
        Ok(Self {
            auth_only: parse_all(&config.auth_only)?,
            protected: parse_all(&config.protected)?,
            public: parse_all(&config.public)?,
            fallback: config.default_class,
        })
    }

    /// Classify a path. Auth-only wins over protected, protected over public,
    /// and anything unmatched gets the configured fallback.
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = request_path(path);
        let hit = |patterns: &[RoutePattern]| patterns.iter().any(|p| p.matches(&path));

        if hit(&self.auth_only) {
            RouteClass::AuthOnly
        } else if hit(&self.protected) {
            RouteClass::Protected
        } else if hit(&self.public) {
            RouteClass::Public
        } else {
            self.fallback
        }
    }
}

fn parse_all(patterns: &[String]) -> CoreResult<Vec<RoutePattern>> {
    patterns.iter().map(|p| RoutePattern::parse(p)).collect()
}
