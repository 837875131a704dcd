//! Request description that can be re-issued after a token refresh

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::error::ClientError;

/// An outbound API call.
///
/// Unlike a `reqwest::RequestBuilder` this can be sent twice, and it carries
/// its own retry marker so retry accounting never leaks between requests.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a header; `Authorization` is managed by the client and ignored
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("authorization") {
            tracing::warn!("Ignoring caller-supplied Authorization header");
        } else {
            self.headers.push((name, value.into()));
        }
        self
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Serialization` if the body cannot be serialized
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this request already went through a refresh-and-retry cycle
    pub const fn is_retried(&self) -> bool {
        self.retried
    }
}
