use crate::config::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
static CONFIG_TEST_ENV_LOCK: Mutex<()> = Mutex::new(());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Missing required setting: {field}")]
    Missing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Settings passed on the command line; they win over every other layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub channel_id: Option<i64>,
    pub fast_mode: bool,
}

pub fn load_config(overrides: CliOverrides, cli_config_path: Option<PathBuf>) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    // Layer 1: Load from config file (~/.autopurge/config.json)
    let config_file = cli_config_path.clone().or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = merge_config_from_file(config, path)?;
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: Environment variables override
    tracing::debug!("Applying environment variable overrides");
    config = merge_env_variables(config)?;

    // Layer 3: CLI flags override (highest precedence)
    apply_cli_overrides(&mut config, &overrides);

    let summary = config.get_safe_summary();
    tracing::debug!(
        telegram_configured = summary.telegram_configured,
        channel_id = ?summary.channel_id,
        retention_hours = summary.retention_hours,
        fast_mode = summary.fast_mode,
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn apply_cli_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(channel_id) = overrides.channel_id {
        tracing::debug!(channel_id, "Applying CLI channel override");
        config.channel_id = Some(channel_id);
    }
    if overrides.fast_mode {
        tracing::debug!("Applying CLI fast mode override");
        config.fast_mode = true;
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".autopurge").join("config.json"))
}

fn merge_config_from_file(config: Config, path: &Path) -> Result<Config> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
        Err(e) => return Err(e).context("Failed to read metadata for config file"),
    };

    let mode = metadata.permissions().mode() & 0o777;
    if mode != 0o600 {
        tracing::error!(
            "Config file {:?} has permissions {:o}, expected 0600 - skipping for security",
            path,
            mode
        );
        return Ok(config);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    // Fields absent from the file keep their defaults through #[serde(default)]
    let file_config: Config = serde_json::from_str(&content).map_err(|e| {
        eprintln!("Error: Configuration file contains invalid JSON.");
        eprintln!("Suggestion: Run 'autopurge init --force' to recreate the configuration file.");
        ConfigError::InvalidJson(e)
    })?;

    Ok(file_config)
}

fn merge_env_variables(config: Config) -> Result<Config, ConfigError> {
    merge_env_with(config, |key| std::env::var(key).ok())
}

/// Applies `BOT_TOKEN`/`TELEGRAM_BOT_TOKEN`, `CHANNEL_ID`, `DEV_MODE` and
/// `PURGE_AGE` from `lookup`. Empty values are treated as unset.
fn merge_env_with<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = var("BOT_TOKEN").or_else(|| var("TELEGRAM_BOT_TOKEN")) {
        config.telegram_token = Some(token.trim().to_string());
    }

    if let Some(raw) = var("CHANNEL_ID") {
        let channel_id = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::invalid("CHANNEL_ID", format!("'{}' is not a chat id", raw)))?;
        config.channel_id = Some(channel_id);
    }

    if let Some(raw) = var("DEV_MODE") {
        config.fast_mode = raw.trim().eq_ignore_ascii_case("true");
    }

    if let Some(raw) = var("PURGE_AGE") {
        let hours = raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|&h| h >= 1)
            .ok_or_else(|| ConfigError::invalid("PURGE_AGE", "must be a positive integer"))?;
        config.retention_hours = hours;
    }

    Ok(config)
}

pub fn save_config(config: &Config, path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(config)?;

    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create config file: {:?}", path))?;

    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    // Owner read/write only; the file holds the bot token
    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to set permissions on config file: {:?}", path))?;

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}

pub fn get_config_path() -> Option<PathBuf> {
    get_default_config_path()
}
