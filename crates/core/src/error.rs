//! Core error types

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised while building core types.
///
/// Storage access never produces one of these: absence is `None`.
/// Configuration loading reports `config::ConfigError` directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid route pattern '{pattern}': {message}")]
    InvalidRoute { pattern: String, message: String },
}

impl CoreError {
    /// Create an invalid route error
    pub fn invalid_route(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRoute {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
