//! CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use portcullis_core::{
    MemoryStorage, Navigator, PortcullisConfig, RouteTable, SessionStore, SystemClock, TokenStore,
};
use portcullis_guard::{GuardDecision, MountState, RouteGuard};
use portcullis_http::{ApiClient, ApiClientBuilder, ApiRequest, AuthPolicy, Method, SessionService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Show how the route guard classifies a page path
    Route {
        /// Page path, e.g. /community/12/edit
        path: String,
    },

    /// Show whether a backend request would carry the access token
    Policy {
        /// HTTP method
        method: String,

        /// Request path or absolute URL
        url: String,
    },

    /// Verify an access token against the backend and print the user
    Whoami {
        /// Access token to verify
        #[arg(long, env = "PORTCULLIS_ACCESS_TOKEN")]
        token: String,
    },

    /// Send a request through the refresh-and-retry client
    Request {
        /// HTTP method
        method: String,

        /// Request path relative to the API base URL
        path: String,

        /// Access token to start with
        #[arg(long, env = "PORTCULLIS_ACCESS_TOKEN")]
        token: Option<String>,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },

    /// Run the route guard for a page path
    Guard {
        /// Page path to guard
        path: String,

        /// Access token held by the client
        #[arg(long, env = "PORTCULLIS_ACCESS_TOKEN")]
        token: Option<String>,
    },

    /// Inspect or generate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a configuration file holding every default
    Generate {
        /// Output file path
        output: PathBuf,
    },
}

impl Commands {
    pub async fn execute(self, settings: PortcullisConfig) -> Result<()> {
        match self {
            Self::Route { path } => show_route(&settings, &path),
            Self::Policy { method, url } => show_policy(&settings, &method, &url),
            Self::Whoami { token } => whoami(&settings, &token).await,
            Self::Request {
                method,
                path,
                token,
                data,
            } => send_request(&settings, &method, path, token, data).await,
            Self::Guard { path, token } => run_guard(&settings, &path, token).await,
            Self::Config { command } => command.execute(&settings),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, settings: &PortcullisConfig) -> Result<()> {
        match self {
            Self::Show => {
                println!("{}", serde_json::to_string_pretty(settings)?);
                Ok(())
            }
            Self::Generate { output } => {
                config::generate_default_config(&output)?;
                info!("Generated configuration at {}", output.display());
                println!("{}", output.display());
                Ok(())
            }
        }
    }
}

/// Navigator for a terminal: there is no page to leave, so just report it
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, location: &str) {
        info!(location, "Navigating");
        eprintln!("-> {location}");
    }
}

fn token_store(settings: &PortcullisConfig, token: Option<&str>) -> TokenStore {
    let tokens = TokenStore::from_config(
        &settings.token,
        Arc::new(MemoryStorage::new()),
        Arc::new(SystemClock),
    );
    if let Some(token) = token {
        tokens.set_access_token(token);
    }
    tokens
}

fn api_client(settings: &PortcullisConfig, tokens: TokenStore) -> Result<ApiClient> {
    Ok(ApiClientBuilder::from_config(settings)?
        .tokens(tokens)
        .navigator(Arc::new(ConsoleNavigator))
        .build()?)
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{method}'"))
}

fn show_route(settings: &PortcullisConfig, path: &str) -> Result<()> {
    let routes = RouteTable::from_config(&settings.routes)?;
    println!("{path}: {}", routes.classify(path));
    Ok(())
}

fn show_policy(settings: &PortcullisConfig, method: &str, url: &str) -> Result<()> {
    let policy = AuthPolicy::from_config(&settings.api)?;
    let method = parse_method(method)?;
    let verdict = if policy.requires_auth(&method, url) {
        "bearer token attached"
    } else {
        "anonymous"
    };
    println!("{method} {url}: {verdict}");
    Ok(())
}

async fn whoami(settings: &PortcullisConfig, token: &str) -> Result<()> {
    let client = api_client(settings, token_store(settings, Some(token)))?;
    let service = SessionService::new(client, SessionStore::new());

    let status = service.check_auth_status().await;
    let state = service.session().snapshot();
    match &state.user {
        Some(user) => println!("{}", serde_json::to_string_pretty(user)?),
        None => match &state.error {
            Some(error) => println!("{status}: {error}"),
            None => println!("{status}"),
        },
    }
    Ok(())
}

async fn send_request(
    settings: &PortcullisConfig,
    method: &str,
    path: String,
    token: Option<String>,
    data: Option<String>,
) -> Result<()> {
    let tokens = token_store(settings, token.as_deref());
    let client = api_client(settings, tokens.clone())?;

    let mut request = ApiRequest::new(parse_method(method)?, path);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(&data).context("--data is not valid JSON")?;
        request = request.json(&body)?;
    }

    let response = client.send(request).await?;
    let status = response.status();
    let body = response.text().await?;

    println!("{status}");
    if !body.is_empty() {
        println!("{body}");
    }
    if token.as_deref() != tokens.get_access_token().as_deref() {
        info!("Access token was refreshed during the request");
    }
    Ok(())
}

async fn run_guard(settings: &PortcullisConfig, path: &str, token: Option<String>) -> Result<()> {
    let tokens = token_store(settings, token.as_deref());
    let client = api_client(settings, tokens.clone())?;

    let guard = RouteGuard::from_config(settings, tokens, SessionStore::new(), Arc::new(client))?
        .navigator(Arc::new(ConsoleNavigator));

    match guard.check(path, &MountState::hydrated()).await {
        GuardDecision::Render => println!("render {path}"),
        GuardDecision::Redirect(location) => println!("redirect {location}"),
        GuardDecision::Loading => println!("loading"),
        GuardDecision::Abandoned => println!("abandoned"),
    }
    Ok(())
}
