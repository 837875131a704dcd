//! Per-request authentication requirement

use portcullis_core::routes::request_path;
use portcullis_core::{ApiConfig, CoreResult, RoutePattern};
use reqwest::Method;

/// Decides from a request's own method and URL whether it carries the
/// access token. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    protected: Vec<RoutePattern>,
    public_reads: Vec<RoutePattern>,
}

impl AuthPolicy {
    pub fn new(protected: Vec<RoutePattern>, public_reads: Vec<RoutePattern>) -> Self {
        Self {
            protected,
            public_reads,
        }
    }

    pub fn from_config(config: &ApiConfig) -> CoreResult<Self> {
        let parse = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| RoutePattern::parse(p))
                .collect::<CoreResult<Vec<_>>>()
        };
        Ok(Self::new(
            parse(&config.protected_prefixes)?,
            parse(&config.public_read_prefixes)?,
        ))
    }

    /// Protected prefix or mutating method, except GETs on public listings
    pub fn requires_auth(&self, method: &Method, url: &str) -> bool {
        let path = request_path(url);

        if *method == Method::GET && self.public_reads.iter().any(|p| p.matches(&path)) {
            return false;
        }

        self.protected.iter().any(|p| p.matches(&path)) || is_mutating(method)
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
