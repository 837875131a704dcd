//! Portcullis core: client-side session state
//!
//! Holds the access credential, the process-wide session store and the
//! static route classification used by the interceptor chain and the
//! route guard.

pub mod clock;
pub mod config;
pub mod error;
pub mod navigation;
pub mod routes;
pub mod session;
pub mod storage;
pub mod token;

pub use clock::{Clock, SystemClock};
pub use config::{ApiConfig, EndpointConfig, PortcullisConfig, RoutesConfig, TokenConfig};
pub use error::{CoreError, CoreResult};
pub use navigation::{Navigator, NoopNavigator, login_location, post_login_destination};
pub use routes::{RouteClass, RoutePattern, RouteTable};
pub use session::{CurrentUser, SessionAction, SessionState, SessionStatus, SessionStore};
pub use storage::{DetachedStorage, MemoryStorage, TokenStorage};
pub use token::{ACCESS_TOKEN_LIFETIME_MS, AccessCredential, StorageKeys, TokenStore};

#[cfg(any(test, feature = "tests"))]
pub use clock::ManualClock;
#[cfg(any(test, feature = "tests"))]
pub use navigation::RecordingNavigator;
#[cfg(target_arch = "wasm32")]
pub use navigation::BrowserNavigator;
#[cfg(target_arch = "wasm32")]
pub use storage::BrowserSessionStorage;
