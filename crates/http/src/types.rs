//! Wire types of the backend auth endpoints

use portcullis_core::CurrentUser;
use serde::{Deserialize, Serialize};

/// Body of a successful `POST /auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,
}

/// Body of a successful `GET /auth/me`, either bare or wrapped in `user`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeResponse {
    Wrapped { user: CurrentUser },
    Bare(CurrentUser),
}

impl MeResponse {
    pub fn into_user(self) -> CurrentUser {
        match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        }
    }
}
