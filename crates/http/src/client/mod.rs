//! Portcullis API client
//!
//! Every call goes through [`ApiClient::send`], which attaches the access
//! token when the request needs it and, on a 401, refreshes the token once
//! and re-issues the request.

pub mod error;
pub mod policy;
mod refresh;
pub mod request;

use error::ClientError;
use policy::AuthPolicy;
use portcullis_core::{
    CurrentUser, EndpointConfig, Navigator, NoopNavigator, PortcullisConfig, TokenStore,
};
use refresh::{RefreshOutcome, RefreshSlot};
use request::ApiRequest;
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{MeResponse, RefreshResponse};

#[cfg(not(target_arch = "wasm32"))]
const USER_AGENT: &str = concat!("portcullis/", env!("CARGO_PKG_VERSION"));

/// HTTP client with the auth interceptor chain
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: String,
    tokens: TokenStore,
    policy: AuthPolicy,
    endpoints: EndpointConfig,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    refresh: RefreshSlot,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Build a client from configuration, sharing `tokens` with the caller
    pub fn from_config(config: &PortcullisConfig, tokens: TokenStore) -> Result<Self, ClientError> {
        ApiClientBuilder::from_config(config)?.tokens(tokens).build()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Whether `url` gets the access token. Absolute URLs outside the API
    /// origin never do, whatever the method.
    pub fn requires_auth(&self, method: &Method, url: &str) -> bool {
        self.targets_api(url) && self.inner.policy.requires_auth(method, url)
    }

    fn targets_api(&self, url: &str) -> bool {
        if !is_absolute(url) {
            return true;
        }
        match (Url::parse(url), Url::parse(&self.inner.base_url)) {
            (Ok(target), Ok(base)) => target.origin() == base.origin(),
            _ => false,
        }
    }

    /// Send a request through the interceptor chain.
    ///
    /// A 401 on a request that needs auth triggers at most one refresh and
    /// one retry. If the refresh fails the local session is torn down, the
    /// navigator is sent to the login page, and `ClientError::RefreshFailed`
    /// is returned.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ClientError> {
        let requires_auth = self.requires_auth(&request.method, &request.path);
        let token = if requires_auth {
            self.inner.tokens.get_access_token()
        } else {
            None
        };

        let response = self.dispatch(&request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || !requires_auth || request.retried {
            return check_status(response).await;
        }

        request.retried = true;
        debug!(method = %request.method, path = %request.path, "Access token rejected, refreshing");

        let token = self
            .refresh_after(token.as_deref())
            .await
            .map_err(ClientError::RefreshFailed)?;

        let response = self.dispatch(&request, Some(&token)).await?;
        check_status(response).await
    }

    /// Send a request and decode the JSON response body
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::patch(path).json(body)?).await
    }

    /// Issue a DELETE; the response body is discarded
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(ApiRequest::delete(path)).await.map(drop)
    }

    /// Obtain a new access token, joining a refresh already in flight
    pub async fn refresh_access_token(&self) -> Result<String, ClientError> {
        let current = self.inner.tokens.get_access_token();
        self.refresh_after(current.as_deref())
            .await
            .map_err(ClientError::RefreshFailed)
    }

    /// Ask the backend who owns `token`. Goes straight to the endpoint with
    /// no refresh: any failure means the server does not accept the session.
    pub async fn current_user(&self, token: &str) -> Result<CurrentUser, ClientError> {
        let response = self
            .raw_request(Method::GET, &self.inner.endpoints.me)
            .bearer_auth(token)
            .send()
            .await?;
        let body: MeResponse = check_status(response).await?.json().await?;
        Ok(body.into_user())
    }

    /// Revoke the refresh cookie on the backend
    pub async fn logout_remote(&self) -> Result<(), ClientError> {
        let response = self
            .raw_request(Method::POST, &self.inner.endpoints.logout)
            .send()
            .await?;
        check_status(response).await.map(drop)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut builder = self.raw_request(request.method.clone(), &request.path);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    fn raw_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = if is_absolute(path) {
            path.to_string()
        } else {
            format!("{}{}", self.inner.base_url, path)
        };

        let builder = self.inner.http.request(method, url);
        #[cfg(target_arch = "wasm32")]
        let builder = builder.fetch_credentials_include();
        builder
    }

    /// Refresh unless another request already replaced or dropped `stale`
    async fn refresh_after(&self, stale: Option<&str>) -> RefreshOutcome {
        match (stale, self.inner.tokens.get_access_token()) {
            (_, Some(current)) if stale != Some(current.as_str()) => {
                debug!("Token already replaced by a concurrent refresh");
                return Ok(current);
            }
            (Some(_), None) => {
                debug!("Session already ended while the request was in flight");
                return Err(Arc::new(ClientError::AuthenticationFailed(
                    "session ended".into(),
                )));
            }
            _ => {}
        }

        let client = self.clone();
        self.inner
            .refresh
            .join_or_start(move || async move {
                let outcome = client.perform_refresh().await;
                client.inner.refresh.clear();
                outcome
            })
            .await
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        match self.request_new_token().await {
            Ok(token) => {
                self.inner.tokens.set_access_token(&token);
                info!("Access token refreshed");
                Ok(token)
            }
            Err(error) => {
                warn!(%error, "Token refresh failed, ending session");
                self.end_session().await;
                Err(Arc::new(error))
            }
        }
    }

    async fn request_new_token(&self) -> Result<String, ClientError> {
        let response = self
            .raw_request(Method::POST, &self.inner.endpoints.refresh)
            .send()
            .await?;
        let body: RefreshResponse = check_status(response).await?.json().await?;

        if body.access_token.is_empty() {
            return Err(ClientError::AuthenticationFailed(
                "refresh response carried no access token".into(),
            ));
        }
        Ok(body.access_token)
    }

    /// Clear local credentials, best-effort logout, then go to the login page
    async fn end_session(&self) {
        self.inner.tokens.clear_all_tokens();

        if let Err(error) = self.logout_remote().await {
            warn!(%error, "Best-effort logout failed");
        }

        self.inner.navigator.navigate(&self.inner.login_path);
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, message))
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    tokens: Option<TokenStore>,
    policy: Option<AuthPolicy>,
    endpoints: EndpointConfig,
    navigator: Option<Arc<dyn Navigator>>,
    login_path: Option<String>,
}

impl ApiClientBuilder {
    /// Pre-populate every setting from configuration
    pub fn from_config(config: &PortcullisConfig) -> Result<Self, ClientError> {
        let policy = AuthPolicy::from_config(&config.api)
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            base_url: Some(config.api.base_url.clone()),
            timeout: Some(config.api.timeout()),
            tokens: None,
            policy: Some(policy),
            endpoints: config.api.endpoints.clone(),
            navigator: None,
            login_path: Some(config.routes.login_path.clone()),
        })
    }

    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Timeout for every outbound call (ignored in the browser)
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn tokens(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: AuthPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Where a failed refresh sends the user
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let tokens = self
            .tokens
            .ok_or_else(|| ClientError::Configuration("token store is required".into()))?;

        let policy = match self.policy {
            Some(policy) => policy,
            None => AuthPolicy::from_config(&portcullis_core::ApiConfig::default())
                .map_err(|e| ClientError::Configuration(e.to_string()))?,
        };

        #[cfg(not(target_arch = "wasm32"))]
        let http = {
            let mut builder = ClientBuilder::new()
                .user_agent(USER_AGENT)
                .cookie_store(true);
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
            builder.build()?
        };

        #[cfg(target_arch = "wasm32")]
        let http = {
            // The browser owns timeouts and the user agent
            let _ = self.timeout;
            ClientBuilder::new().build()?
        };

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                tokens,
                policy,
                endpoints: self.endpoints,
                navigator: self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator)),
                login_path: self.login_path.unwrap_or_else(|| "/auth/login".into()),
                refresh: RefreshSlot::default(),
            }),
        })
    }
}
