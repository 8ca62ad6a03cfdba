//! Configuration for the trading gate.
//!
//! Sections deserialize from YAML with per-field defaults, so a partial
//! file (or none at all) yields a fully populated configuration. The
//! kill-switch override code can be supplied via the
//! `TRADING_GATE_OVERRIDE_CODE` environment variable, which takes
//! precedence over the file.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trading_gate::config::{Config, load_config};
//!
//! // Defaults only
//! let config = Config::default();
//!
//! // From a YAML file, with env overrides applied
//! let config = load_config(Some("gate.yaml"))?;
//! ```

mod connection;
mod monitor;
mod safety;

pub use connection::ConnectionConfig;
pub use monitor::MonitorConfig;
pub use safety::{RateLimitsConfig, SafetyConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the kill-switch override code.
pub const OVERRIDE_CODE_ENV: &str = "TRADING_GATE_OVERRIDE_CODE";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Safety ceilings, rate limits, and account policy.
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Broker session retry/backoff settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Protective-order monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` when a ceiling is zero or
    /// otherwise unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.safety.rate_limits.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rate limit window must be at least 1 second".to_string(),
            ));
        }
        if self.safety.max_daily_orders == 0 {
            return Err(ConfigError::ValidationError(
                "max_daily_orders must be at least 1".to_string(),
            ));
        }
        if self.safety.max_order_size <= rust_decimal::Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "max_order_size must be positive".to_string(),
            ));
        }
        if self.connection.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "connection max_attempts must be at least 1".to_string(),
            ));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "monitor poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment-variable overrides (secrets stay out of files).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(code) = std::env::var(OVERRIDE_CODE_ENV) {
            if !code.is_empty() {
                self.safety.kill_switch_override_code = code;
            }
        }
    }
}

/// Load configuration from an optional YAML path.
///
/// With `None`, defaults are used. Environment overrides are applied in
/// both cases, and the result is validated.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read or parsed, or if
/// validation fails.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::ReadError {
                path: p.to_string(),
                source,
            })?;
            serde_yaml_bw::from_str(&raw)?
        }
        None => Config::default(),
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
