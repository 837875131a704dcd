//! Portcullis CLI - inspect route classes and exercise sessions

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "portcullis")]
#[command(about = "Session, token refresh and route guard toolkit")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, env = "PORTCULLIS_CONFIG")]
    config: Option<PathBuf>,

    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Timeout for backend calls in seconds (overrides configuration)
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.into())?;

    let mut settings = config::load_config(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        config::override_timeout(&mut settings, secs)?;
    }
    debug!(base_url = %settings.api.base_url, "Configuration loaded");

    let deadline = config::command_deadline(&settings);
    match tokio::time::timeout(deadline, cli.command.execute(settings)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
        Err(_) => {
            error!("Command timed out after {} seconds", deadline.as_secs());
            std::process::exit(1);
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
