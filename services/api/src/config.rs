//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use stories_core::feed::DEFAULT_PAGE_SIZE;
use stories_core::playback::{PlaybackConfig, DEFAULT_TICKS_PER_SECOND};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Behaviour of the mock remote story source.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteConfig {
    /// Optional JSON feed on disk; the bundled sample feed is used otherwise.
    pub feed_path: Option<PathBuf>,
    pub delay: Duration,
    /// Probability in `[0, 1]` that a fetch fails.
    pub error_rate: f64,
    pub should_fail: bool,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub page_size: usize,
    pub remote: RemoteConfig,
    pub playback: PlaybackConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://stories.db?mode=rwc".to_string());
        if database_url.trim().is_empty() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Feed Settings ---
        let page_size: usize = parse_var("PAGE_SIZE", Ok(DEFAULT_PAGE_SIZE))?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PAGE_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let feed_path = std::env::var("STORIES_FEED_PATH").ok().map(PathBuf::from);
        let delay_ms: u64 = parse_var("REMOTE_DELAY_MS", Ok(500))?;
        let error_rate: f64 = parse_var("REMOTE_ERROR_RATE", Ok(0.25))?;
        if !(0.0..=1.0).contains(&error_rate) {
            return Err(ConfigError::InvalidValue(
                "REMOTE_ERROR_RATE".to_string(),
                format!("{} is not within 0.0..=1.0", error_rate),
            ));
        }
        let should_fail: bool = parse_var("REMOTE_SHOULD_FAIL", Ok(false))?;

        // --- Load Playback Settings ---
        let ticks_per_second: u32 = parse_var("TICKS_PER_SECOND", Ok(DEFAULT_TICKS_PER_SECOND))?;
        let tick_interval_ms: u64 = parse_var("TICK_INTERVAL_MS", Ok(10))?;
        if ticks_per_second == 0 || tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TICKS_PER_SECOND/TICK_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            page_size,
            remote: RemoteConfig {
                feed_path,
                delay: Duration::from_millis(delay_ms),
                error_rate,
                should_fail,
            },
            playback: PlaybackConfig {
                ticks_per_second,
                tick_interval: Duration::from_millis(tick_interval_ms),
            },
        })
    }
}

/// Parses an optional variable, falling back to `default` when it is unset.
fn parse_var<T>(name: &str, default: Result<T, T::Err>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => default.map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
