//! Portcullis HTTP layer
//!
//! The interceptor chain that attaches access tokens and recovers from
//! expiry, plus the session operations built on top of it.

pub mod client;
pub mod services;
pub mod types;

pub use client::error::ClientError;
pub use client::policy::AuthPolicy;
pub use client::request::ApiRequest;
pub use client::{ApiClient, ApiClientBuilder};
pub use services::SessionService;

pub use reqwest::Method;
