//! Configuration for the session manager
//!
//! Defaults cover the stock backend contract. A file (format chosen by
//! extension) and `PORTCULLIS_`-prefixed environment variables layer on top,
//! e.g. `PORTCULLIS_API__BASE_URL=https://api.example.com`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::routes::{RouteClass, RoutePattern};
use crate::token::ACCESS_TOKEN_LIFETIME_MS;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortcullisConfig {
    pub api: ApiConfig,
    pub token: TokenConfig,
    pub routes: RoutesConfig,
}

/// Backend connection and request policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Timeout applied to every outbound call
    pub timeout_secs: u64,
    pub endpoints: EndpointConfig,
    /// API prefixes that always carry the access token
    pub protected_prefixes: Vec<String>,
    /// Listing endpoints whose GETs never carry the access token
    pub public_read_prefixes: Vec<String>,
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            timeout_secs: 10,
            endpoints: EndpointConfig::default(),
            protected_prefixes: vec![
                "/auth/me".into(),
                "/users/me".into(),
                "/characters".into(),
                "/game".into(),
                "/admin".into(),
            ],
            public_read_prefixes: vec!["/posts".into(), "/comments".into()],
        }
    }
}

/// Backend auth endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub refresh: String,
    pub logout: String,
    pub me: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            refresh: "/auth/refresh".into(),
            logout: "/auth/logout".into(),
            me: "/auth/me".into(),
        }
    }
}

/// Access token storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub lifetime_ms: i64,
    pub access_token_key: String,
    pub stored_at_key: String,
    pub legacy_keys: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            lifetime_ms: ACCESS_TOKEN_LIFETIME_MS,
            access_token_key: "accessToken".into(),
            stored_at_key: "accessTokenStoredAt".into(),
            legacy_keys: vec!["refreshToken".into()],
        }
    }
}

/// Client-side route classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub login_path: String,
    /// Where signed-in users land when they open an auth-only page
    pub home_path: String,
    pub protected: Vec<String>,
    pub public: Vec<String>,
    pub auth_only: Vec<String>,
    pub default_class: RouteClass,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".into(),
            home_path: "/".into(),
            protected: vec![
                "/community/write".into(),
                "/community/:id/edit".into(),
                "/game".into(),
                "/mypage".into(),
                "/admin".into(),
            ],
            public: vec!["/".into(), "/about".into(), "/community".into()],
            auth_only: vec!["/auth/login".into(), "/auth/signup".into()],
            default_class: RouteClass::Public,
        }
    }
}

impl PortcullisConfig {
    /// Load from defaults, an optional file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// result fails validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, default_environment())
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the session manager relies on
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first violation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Message("api.base_url must not be empty".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Message("api.timeout_secs must be positive".into()));
        }
        if self.token.lifetime_ms <= 0 {
            return Err(ConfigError::Message("token.lifetime_ms must be positive".into()));
        }
        if self.token.access_token_key == self.token.stored_at_key {
            return Err(ConfigError::Message(
                "token.access_token_key and token.stored_at_key must differ".into(),
            ));
        }

        let endpoints = [
            ("api.endpoints.refresh", &self.api.endpoints.refresh),
            ("api.endpoints.logout", &self.api.endpoints.logout),
            ("api.endpoints.me", &self.api.endpoints.me),
            ("routes.login_path", &self.routes.login_path),
            ("routes.home_path", &self.routes.home_path),
        ];
        for (field, value) in endpoints {
            validate_path(value, field)?;
        }

        let patterns = self
            .api
            .protected_prefixes
            .iter()
            .chain(&self.api.public_read_prefixes)
            .chain(&self.routes.protected)
            .chain(&self.routes.public)
            .chain(&self.routes.auth_only);
        for pattern in patterns {
            RoutePattern::parse(pattern).map_err(|e| ConfigError::Message(e.to_string()))?;
        }

        Ok(())
    }
}

fn default_environment() -> Environment {
    Environment::with_prefix("PORTCULLIS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn validate_path(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::Message(format!(
            "{field} must start with '/', got '{value}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        default_environment().source(Some(map))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PortcullisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.api.endpoints.refresh, "/auth/refresh");
        assert_eq!(config.token.lifetime_ms, 900_000);
        assert_eq!(config.routes.login_path, "/auth/login");
    }

    #[test]
    fn test_load_without_sources_yields_defaults() {
        let config = PortcullisConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, PortcullisConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://api.example.com"
timeout_secs = 3

[routes]
default_class = "protected"
"#
        )
        .unwrap();

        let config = PortcullisConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.timeout(), Duration::from_secs(3));
        assert_eq!(config.routes.default_class, RouteClass::Protected);
        assert_eq!(config.api.endpoints.me, "/auth/me");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[api]\nbase_url = \"https://file.example.com\"").unwrap();

        let config = PortcullisConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("PORTCULLIS_API__BASE_URL", "https://env.example.com"),
                ("PORTCULLIS_TOKEN__LIFETIME_MS", "60000"),
            ]),
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://env.example.com");
        assert_eq!(config.token.lifetime_ms, 60_000);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PortcullisConfig::default();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = PortcullisConfig::default();
        config.token.lifetime_ms = 0;
        assert!(config.validate().is_err());

        let mut config = PortcullisConfig::default();
        config.routes.login_path = "auth/login".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("routes.login_path"));

        let mut config = PortcullisConfig::default();
        config.routes.protected.push("game".into());
        assert!(config.validate().is_err());

        let mut config = PortcullisConfig::default();
        config.token.stored_at_key = config.token.access_token_key.clone();
        assert!(config.validate().is_err());
    }
}
