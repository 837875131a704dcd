//! Access token store
//!
//! Single source of truth for the short-lived access credential. The
//! long-lived refresh credential is an HTTP-only cookie owned by the
//! backend and never passes through here.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::TokenConfig;
use crate::storage::TokenStorage;

/// Lifetime after which a stored access token is considered stale (15 minutes)
pub const ACCESS_TOKEN_LIFETIME_MS: i64 = 15 * 60 * 1000;

/// Storage keys used by the token store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub access_token: String,
    pub stored_at: String,
    /// Keys written by older clients, removed on full cleanup
    pub legacy: Vec<String>,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            access_token: "accessToken".into(),
            stored_at: "accessTokenStoredAt".into(),
            legacy: vec!["refreshToken".into()],
        }
    }
}

/// Access token together with the time it was stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub token: String,
    pub stored_at: i64,
}

impl AccessCredential {
    /// Age in milliseconds relative to `now`.
    ///
    /// `None` when the timestamp lies in the future or is too far away to
    /// subtract, which only happens if storage was tampered with.
    pub const fn age(&self, now_millis: i64) -> Option<i64> {
        match now_millis.checked_sub(self.stored_at) {
            Some(age) if age >= 0 => Some(age),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    clock: Arc<dyn Clock>,
    keys: Arc<StorageKeys>,
    lifetime_ms: i64,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<dyn TokenStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            keys: Arc::new(StorageKeys::default()),
            lifetime_ms: ACCESS_TOKEN_LIFETIME_MS,
        }
    }

    /// Build a store with keys and lifetime taken from configuration
    pub fn from_config(
        config: &TokenConfig,
        storage: Arc<dyn TokenStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            clock,
            keys: Arc::new(StorageKeys {
                access_token: config.access_token_key.clone(),
                stored_at: config.stored_at_key.clone(),
                legacy: config.legacy_keys.clone(),
            }),
            lifetime_ms: config.lifetime_ms,
        }
    }

    #[must_use]
    pub fn lifetime_ms(mut self, lifetime_ms: i64) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn get_access_token(&self) -> Option<String> {
        self.storage.get_item(&self.keys.access_token)
    }

    /// Store a token and stamp it with the current time
    pub fn set_access_token(&self, token: &str) {
        let now = self.clock.now_millis();
        self.storage.set_item(&self.keys.access_token, token);
        self.storage.set_item(&self.keys.stored_at, &now.to_string());
    }

    pub fn clear_access_token(&self) {
        self.storage.remove_item(&self.keys.access_token);
        self.storage.remove_item(&self.keys.stored_at);
    }

    /// Remove every client-held credential. The refresh cookie is cleared
    /// by the backend logout call.
    pub fn clear_all_tokens(&self) {
        self.clear_access_token();
        for key in &self.keys.legacy {
            self.storage.remove_item(key);
        }
    }

    /// Token and its issuance timestamp, if both are present and readable
    pub fn access_credential(&self) -> Option<AccessCredential> {
        let token = self.get_access_token()?;
        let stored_at = self
            .storage
            .get_item(&self.keys.stored_at)?
            .parse::<i64>()
            .ok()?;
        Some(AccessCredential { token, stored_at })
    }

    /// Milliseconds since the token was stored
    pub fn token_age(&self) -> Option<i64> {
        self.access_credential()?.age(self.clock.now_millis())
    }

    /// Local possession and clock-based freshness only. The token itself
    /// is never decoded; the backend remains the authority.
    pub fn is_token_valid(&self) -> bool {
        self.token_age()
            .is_some_and(|age| age < self.lifetime_ms)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("keys", &self.keys)
            .field("lifetime_ms", &self.lifetime_ms)
            .finish_non_exhaustive()
    }
}
