//! Process-wide session store
//!
//! Holds the session status and the authenticated principal. State only
//! changes through [`SessionAction`]s passed to [`SessionStore::dispatch`],
//! so every transition goes through [`SessionState::reduce`].

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Authenticated,
    Unauthenticated,
    Error,
}

impl SessionStatus {
    /// Whether verification has concluded the session is not usable
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Error)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Authenticated principal as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "username", alias = "nickname")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl CurrentUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Snapshot of the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub user: Option<CurrentUser>,
    pub error: Option<String>,
}

/// Named transitions of the session store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    SetLoading,
    SetAuthenticated(CurrentUser),
    SetUnauthenticated,
    SetError(String),
    Logout,
}

impl SessionState {
    #[must_use]
    pub fn reduce(&self, action: SessionAction) -> Self {
        match action {
            SessionAction::SetLoading => Self {
                status: SessionStatus::Loading,
                user: self.user.clone(),
                error: None,
            },
            SessionAction::SetAuthenticated(user) => Self {
                status: SessionStatus::Authenticated,
                user: Some(user),
                error: None,
            },
            SessionAction::SetUnauthenticated | SessionAction::Logout => Self {
                status: SessionStatus::Unauthenticated,
                user: None,
                error: None,
            },
            SessionAction::SetError(message) => Self {
                status: SessionStatus::Error,
                user: None,
                error: Some(message),
            },
        }
    }
}

static GLOBAL_SESSION: Lazy<SessionStore> = Lazy::new(SessionStore::new);

/// Observable session store
#[derive(Clone, Debug)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Arc<SessionState>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a store in the idle state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(SessionState::default()));
        Self { tx: Arc::new(tx) }
    }

    /// The process-wide store shared by the application
    pub fn global() -> Self {
        GLOBAL_SESSION.clone()
    }

    pub fn dispatch(&self, action: SessionAction) {
        self.tx.send_modify(|state| {
            let next = state.reduce(action);
            if next.status != state.status {
                debug!(from = %state.status, to = %next.status, "Session transition");
            }
            *state = Arc::new(next);
        });
    }

    pub fn snapshot(&self) -> Arc<SessionState> {
        self.tx.borrow().clone()
    }

    /// Receive every subsequent transition
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionState>> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.tx.borrow().status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.status() == SessionStatus::Loading
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.tx.borrow().user.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> CurrentUser {
        CurrentUser {
            id: "7".into(),
            name: "ada".into(),
            email: Some("ada@example.com".into()),
            permissions: vec!["board:write".into()],
        }
    }

    #[test]
    fn test_starts_idle() {
        let store = SessionStore::new();
        assert_eq!(store.status(), SessionStatus::Idle);
        assert!(store.current_user().is_none());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let store = SessionStore::new();

        store.dispatch(SessionAction::SetLoading);
        assert!(store.is_loading());

        store.dispatch(SessionAction::SetAuthenticated(user()));
        assert!(store.is_authenticated());
        assert_eq!(store.current_user(), Some(user()));

        store.dispatch(SessionAction::Logout);
        assert_eq!(store.status(), SessionStatus::Unauthenticated);
        assert!(store.current_user().is_none());
    }

    #[test]
    fn test_loading_keeps_user_and_clears_error() {
        let state = SessionState::default()
            .reduce(SessionAction::SetAuthenticated(user()))
            .reduce(SessionAction::SetLoading);
        assert_eq!(state.user, Some(user()));

        let state = state
            .reduce(SessionAction::SetError("backend down".into()))
            .reduce(SessionAction::SetLoading);
        assert_eq!(state.status, SessionStatus::Loading);
        assert!(state.error.is_none());
        assert!(state.user.is_none());
    }

    #[test]
    fn test_error_drops_user() {
        let state = SessionState::default()
            .reduce(SessionAction::SetAuthenticated(user()))
            .reduce(SessionAction::SetError("timeout".into()));
        assert_eq!(state.status, SessionStatus::Error);
        assert!(state.user.is_none());
        assert_eq!(state.error.as_deref(), Some("timeout"));
        assert!(state.status.is_failed());
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.dispatch(SessionAction::SetAuthenticated(user()));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, SessionStatus::Authenticated);
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        other.dispatch(SessionAction::SetUnauthenticated);
        assert_eq!(store.status(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_user_deserializes_numeric_id_and_aliases() {
        let user: CurrentUser = serde_json::from_str(
            r#"{"id": 12, "username": "grace", "permissions": ["admin"]}"#,
        )
        .unwrap();
        assert_eq!(user.id, "12");
        assert_eq!(user.name, "grace");
        assert!(user.email.is_none());
        assert!(user.has_permission("admin"));
        assert!(!user.has_permission("board:write"));
    }
}
