use async_trait::async_trait;
use portcullis_core::CurrentUser;
use portcullis_http::{ApiClient, ClientError};

/// Asks the backend whether a token still belongs to a live session
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<CurrentUser, ClientError>;
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl SessionVerifier for ApiClient {
    async fn verify(&self, token: &str) -> Result<CurrentUser, ClientError> {
        self.current_user(token).await
    }
}
