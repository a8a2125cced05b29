//! services/bot/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub log_level: Level,
    pub show_api_base_url: String,
    pub telegram_api_base_url: String,
    /// Upper bound for a single search or episode-listing call.
    pub http_timeout: Duration,
    pub reminder_poll_interval: Duration,
    /// Reminders due within this window of "now" are delivered on the current poll.
    pub reminder_lookahead: Duration,
    pub long_poll_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Transport and Storage ---
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite:tvreminder.db?mode=rwc".to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Remote APIs ---
        let show_api_base_url = lookup("SHOW_API_BASE_URL")
            .unwrap_or_else(|| "https://api.tvmaze.com".to_string());
        let telegram_api_base_url = lookup("TELEGRAM_API_BASE_URL")
            .unwrap_or_else(|| "https://api.telegram.org".to_string());

        // --- Timing ---
        let http_timeout = seconds(&lookup, "HTTP_TIMEOUT_SECS", 8)?;
        let reminder_poll_interval = seconds(&lookup, "REMINDER_POLL_INTERVAL_SECS", 10)?;
        let reminder_lookahead = seconds(&lookup, "REMINDER_LOOKAHEAD_SECS", 300)?;
        let long_poll_timeout = seconds(&lookup, "LONG_POLL_TIMEOUT_SECS", 30)?;

        if reminder_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "REMINDER_POLL_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token,
            database_url,
            log_level,
            show_api_base_url,
            telegram_api_base_url,
            http_timeout,
            reminder_poll_interval,
            reminder_lookahead,
            long_poll_timeout,
        })
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
