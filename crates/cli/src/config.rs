//! CLI configuration utilities

use anyhow::{Context, Result};
use portcullis_core::PortcullisConfig;
use std::path::Path;
use std::time::Duration;

/// Load layered configuration: defaults, optional file, then environment
pub fn load_config(path: Option<&Path>) -> Result<PortcullisConfig> {
    PortcullisConfig::load(path).context("failed to load configuration")
}

/// Apply `--timeout` and re-check the configuration it changed
pub fn override_timeout(config: &mut PortcullisConfig, secs: u64) -> Result<()> {
    config.api.timeout_secs = secs;
    config.validate().context("invalid --timeout")?;
    Ok(())
}

/// Overall budget for one command: the first call, a refresh and one retry
pub fn command_deadline(config: &PortcullisConfig) -> Duration {
    config
        .api
        .timeout()
        .saturating_mul(3)
        .saturating_add(Duration::from_secs(1))
}

/// Write configuration as pretty JSON
pub fn save_config(config: &PortcullisConfig, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Generate a configuration file holding every default
pub fn generate_default_config(path: &Path) -> Result<()> {
    save_config(&PortcullisConfig::default(), path)
}
