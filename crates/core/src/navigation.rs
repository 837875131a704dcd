//! Navigation side effects and login redirect helpers

use url::form_urlencoded;

/// Query parameter carrying the originally requested path
pub const REDIRECT_PARAM: &str = "redirect";

/// Performs full client-side navigations
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Navigator that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, location: &str) {
        tracing::debug!(location, "Navigation suppressed");
    }
}

/// Assigns `window.location`
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNavigator;

#[cfg(target_arch = "wasm32")]
impl Navigator for BrowserNavigator {
    fn navigate(&self, location: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if window.location().set_href(location).is_err() {
            tracing::warn!(location, "Failed to navigate");
        }
    }
}

/// Navigator that records every location, for tests
#[cfg(any(test, feature = "tests"))]
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "tests"))]
impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

#[cfg(any(test, feature = "tests"))]
impl Navigator for RecordingNavigator {
    fn navigate(&self, location: &str) {
        self.visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(location.to_string());
    }
}

/// Login URL that returns the user to `redirect` after signing in
pub fn login_location(login_path: &str, redirect: Option<&str>) -> String {
    match redirect {
        Some(target) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair(REDIRECT_PARAM, target)
                .finish();
            format!("{login_path}?{query}")
        }
        None => login_path.to_string(),
    }
}

/// Destination after a successful login.
///
/// Takes the `redirect` parameter from the login page query when it names a
/// path on this origin; anything else falls back to `home`.
pub fn post_login_destination(query: &str, home: &str) -> String {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == REDIRECT_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|target| is_local_path(target))
        .unwrap_or_else(|| home.to_string())
}

/// Browsers drop tab, CR and LF while parsing, so a control character can
/// turn `/\t/host` into `//host`.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(char::is_control)
}
