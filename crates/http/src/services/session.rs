//! Session lifecycle operations
//!
//! Verifies the stored token against the backend and keeps the session
//! store in step with the outcome.

use portcullis_core::{SessionAction, SessionStatus, SessionStore};
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::client::error::ClientError;

#[derive(Clone, Debug)]
pub struct SessionService {
    client: ApiClient,
    session: SessionStore,
}

impl SessionService {
    pub const fn new(client: ApiClient, session: SessionStore) -> Self {
        Self { client, session }
    }

    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Verify the stored token and settle the session status.
    ///
    /// A token past its local lifetime is refreshed first. A rejected
    /// token ends as `Unauthenticated`; a transport or server failure ends
    /// as `Error`.
    pub async fn check_auth_status(&self) -> SessionStatus {
        self.session.dispatch(SessionAction::SetLoading);
        let tokens = self.client.tokens();

        let Some(mut token) = tokens.get_access_token() else {
            debug!("No access token stored");
            self.session.dispatch(SessionAction::SetUnauthenticated);
            return self.session.status();
        };

        if !tokens.is_token_valid() {
            debug!("Stored access token is stale, refreshing before verification");
            match self.client.refresh_access_token().await {
                Ok(fresh) => token = fresh,
                Err(error) => {
                    warn!(%error, "Could not refresh stale access token");
                    self.session.dispatch(SessionAction::SetUnauthenticated);
                    return self.session.status();
                }
            }
        }

        match self.client.current_user(&token).await {
            Ok(user) => {
                info!(user_id = %user.id, "Session verified");
                self.session.dispatch(SessionAction::SetAuthenticated(user));
            }
            Err(error) if error.is_unauthorized() => {
                debug!("Backend rejected access token");
                tokens.clear_access_token();
                self.session.dispatch(SessionAction::SetUnauthenticated);
            }
            Err(error) => {
                warn!(%error, "Session verification failed");
                self.session.dispatch(SessionAction::SetError(error.to_string()));
            }
        }

        self.session.status()
    }

    /// Adopt the access token issued by a successful login
    ///
    /// # Errors
    ///
    /// Returns the verification error after clearing the token and marking
    /// the session unauthenticated
    pub async fn establish(&self, access_token: &str) -> Result<(), ClientError> {
        self.client.tokens().set_access_token(access_token);
        self.session.dispatch(SessionAction::SetLoading);

        match self.client.current_user(access_token).await {
            Ok(user) => {
                info!(user_id = %user.id, "Session established");
                self.session.dispatch(SessionAction::SetAuthenticated(user));
                Ok(())
            }
            Err(error) => {
                self.client.tokens().clear_access_token();
                self.session.dispatch(SessionAction::SetUnauthenticated);
                Err(error)
            }
        }
    }

    /// End the session. The backend call is best-effort; local state is
    /// always cleared.
    pub async fn logout(&self) {
        if let Err(error) = self.client.logout_remote().await {
            warn!(%error, "Best-effort logout failed");
        }
        self.client.tokens().clear_all_tokens();
        self.session.dispatch(SessionAction::Logout);
        info!("Logged out");
    }
}
