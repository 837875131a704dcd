use portcullis_core::{
    CoreResult, Navigator, NoopNavigator, PortcullisConfig, RouteClass, RouteTable,
    SessionAction, SessionStore, TokenStore, login_location,
};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::verifier::SessionVerifier;

/// Lifecycle of the view the guard protects.
///
/// Nothing is decided before hydration, and a verification that settles
/// after the view went away must not touch shared state.
#[derive(Debug)]
pub struct MountState {
    hydrated: AtomicBool,
    mounted: AtomicBool,
}

impl MountState {
    /// A mounted view that has not hydrated yet
    pub const fn new() -> Self {
        Self {
            hydrated: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
        }
    }

    /// Mounted and already able to read storage
    pub const fn hydrated() -> Self {
        Self {
            hydrated: AtomicBool::new(true),
            mounted: AtomicBool::new(true),
        }
    }

    pub fn hydrate(&self) {
        self.hydrated.store(true, Ordering::SeqCst);
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

impl Default for MountState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Hydrating,
    Classifying,
    Checking,
    Authorized,
    Redirecting,
}

impl fmt::Display for GuardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hydrating => "hydrating",
            Self::Classifying => "classifying",
            Self::Checking => "checking",
            Self::Authorized => "authorized",
            Self::Redirecting => "redirecting",
        };
        f.write_str(name)
    }
}

/// What the view should do after a guard check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show a loading indicator; no decision yet
    Loading,
    /// Render the requested view
    Render,
    /// Render nothing; navigation to this location is in flight
    Redirect(String),
    /// The view unmounted while the check was pending
    Abandoned,
}

impl GuardDecision {
    pub const fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }

    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Self::Redirect(location) => Some(location),
            _ => None,
        }
    }
}

/// Gates rendering of routes by their classification and session state
pub struct RouteGuard {
    routes: RouteTable,
    tokens: TokenStore,
    session: SessionStore,
    verifier: Arc<dyn SessionVerifier>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    home_path: String,
}

impl RouteGuard {
    pub fn new(
        routes: RouteTable,
        tokens: TokenStore,
        session: SessionStore,
        verifier: Arc<dyn SessionVerifier>,
    ) -> Self {
        Self {
            routes,
            tokens,
            session,
            verifier,
            navigator: Arc::new(NoopNavigator),
            login_path: "/auth/login".to_string(),
            home_path: "/".to_string(),
        }
    }

    /// Build a guard with route classes and paths taken from configuration
    pub fn from_config(
        config: &PortcullisConfig,
        tokens: TokenStore,
        session: SessionStore,
        verifier: Arc<dyn SessionVerifier>,
    ) -> CoreResult<Self> {
        let routes = RouteTable::from_config(&config.routes)?;
        Ok(Self::new(routes, tokens, session, verifier)
            .login_path(config.routes.login_path.clone())
            .home_path(config.routes.home_path.clone()))
    }

    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide what to do with a navigation to `path`.
    ///
    /// Protected paths are verified against the backend. A missing token, a
    /// failed session, a rejected token and a network failure all end the
    /// same way: local state is evicted and the user is sent to the login
    /// page with `path` as the redirect target.
    pub async fn check(&self, path: &str, mount: &MountState) -> GuardDecision {
        if !mount.is_hydrated() {
            trace_phase(path, GuardPhase::Hydrating);
            return GuardDecision::Loading;
        }

        trace_phase(path, GuardPhase::Classifying);
        let class = self.routes.classify(path);

        match class {
            RouteClass::Public => self.authorize(path),
            RouteClass::AuthOnly => self.check_auth_only(path),
            RouteClass::Protected => self.check_protected(path, mount).await,
        }
    }

    /// Drop every trace of the local session: store first, then storage.
    pub fn evict(&self) {
        self.session.dispatch(SessionAction::Logout);
        self.tokens.clear_all_tokens();
    }

    fn check_auth_only(&self, path: &str) -> GuardDecision {
        let signed_in =
            self.tokens.get_access_token().is_some() && self.session.is_authenticated();
        if signed_in {
            debug!(path, "Signed-in user on auth-only page, sending home");
            let home = self.home_path.clone();
            return self.redirect(path, home);
        }
        self.authorize(path)
    }

    async fn check_protected(&self, path: &str, mount: &MountState) -> GuardDecision {
        trace_phase(path, GuardPhase::Checking);

        let Some(token) = self.tokens.get_access_token() else {
            debug!(path, "No access token for protected route");
            return self.deny(path);
        };

        let status = self.session.status();
        if status.is_failed() {
            debug!(path, %status, "Session already failed");
            return self.deny(path);
        }

        let verified = self.verifier.verify(&token).await;

        if !mount.is_mounted() {
            debug!(path, "View unmounted during verification");
            return GuardDecision::Abandoned;
        }

        match verified {
            Ok(user) => {
                if !self.session.is_authenticated() {
                    info!(path, user_id = %user.id, "Session verified by guard");
                    self.session.dispatch(SessionAction::SetAuthenticated(user));
                }
                self.authorize(path)
            }
            Err(error) => {
                warn!(path, %error, "Server rejected session");
                self.deny(path)
            }
        }
    }

    fn authorize(&self, path: &str) -> GuardDecision {
        trace_phase(path, GuardPhase::Authorized);
        GuardDecision::Render
    }

    fn deny(&self, path: &str) -> GuardDecision {
        self.evict();
        let location = login_location(&self.login_path, Some(path));
        self.redirect(path, location)
    }

    fn redirect(&self, path: &str, location: String) -> GuardDecision {
        trace_phase(path, GuardPhase::Redirecting);
        self.navigator.navigate(&location);
        GuardDecision::Redirect(location)
    }
}

impl fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGuard")
            .field("routes", &self.routes)
            .field("login_path", &self.login_path)
            .field("home_path", &self.home_path)
            .finish_non_exhaustive()
    }
}

fn trace_phase(path: &str, phase: GuardPhase) {
    debug!(path, %phase, "Route guard phase");
}
