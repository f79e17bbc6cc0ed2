//! Application settings loaded from `config.toml`.
//!
//! Every field has a default so a missing section is not fatal; the database URL can
//! still be overridden with `DATABASE_URL` (see [`super::database::get_database_url`]).

use crate::errors::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Database settings
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Attendance token defaults
    #[serde(default)]
    pub tokens: TokenSettings,
    /// Maintenance sweep switches
    #[serde(default)]
    pub sweep: SweepSettings,
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Connection URL, e.g. `sqlite://data/mess_ledger.sqlite?mode=rwc`
    pub url: Option<String>,
    /// How often a read-only aggregation may be retried on pool exhaustion
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,
}

/// `[tokens]` section
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSettings {
    /// Lifetime of a newly issued token, in minutes
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// How many scans a meal-attendance token allows
    #[serde(default = "default_max_usage")]
    pub max_usage: i32,
}

/// `[sweep]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SweepSettings {
    /// Lock today's meals for every mess whose cutoff has passed
    #[serde(default = "enabled")]
    pub lock_meals: bool,
    /// Deactivate tokens past their expiry
    #[serde(default = "enabled")]
    pub expire_tokens: bool,
}

const fn default_read_attempts() -> u32 {
    3
}

const fn default_ttl_minutes() -> i64 {
    15
}

const fn default_max_usage() -> i32 {
    1
}

const fn enabled() -> bool {
    true
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            max_usage: default_max_usage(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            read_attempts: default_read_attempts(),
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            lock_meals: true,
            expire_tokens: true,
        }
    }
}

impl TokenSettings {
    /// Token lifetime as a duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes)
    }
}

/// Parses settings from TOML text and validates them.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if settings.tokens.ttl_minutes <= 0 {
        return Err(Error::Config {
            message: "tokens.ttl_minutes must be positive".to_string(),
        });
    }
    if settings.tokens.max_usage <= 0 {
        return Err(Error::Config {
            message: "tokens.max_usage must be positive".to_string(),
        });
    }
    Ok(settings)
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid, or a
/// value is out of range.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading settings from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `./config.toml`, or defaults when the file does not exist.
pub fn load_default_settings() -> Result<Settings> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_settings(path)
    } else {
        tracing::info!("No config.toml found, using default settings");
        Ok(Settings::default())
    }
}
