//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use research_assistant_core::DEFAULT_STARTING_CREDITS;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `ResearchStore` implementation backs the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// The remote REST table API at the given base URL.
    Tables { base_url: String },
    /// Process-local tables, lost on restart.
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub log_level: Level,
    pub starting_credits: u32,
    /// Multiplier applied to the simulated stage delays. `0.0` disables them.
    pub stage_duration_scale: f64,
    pub cors_origin: String,
    /// Sessions untouched for this long are dropped from memory.
    pub session_idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            store: StoreBackend::Memory,
            log_level: Level::INFO,
            starting_credits: DEFAULT_STARTING_CREDITS,
            stage_duration_scale: 1.0,
            cors_origin: "http://localhost:3000".to_string(),
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
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

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Store Settings ---
        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "tables".to_string());
        let store = match backend.to_lowercase().as_str() {
            "tables" => {
                let base_url = lookup("TABLES_BASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("TABLES_BASE_URL".to_string()))?;
                StoreBackend::Tables {
                    base_url: base_url.trim_end_matches('/').to_string(),
                }
            }
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of 'tables' or 'memory'", other),
                ))
            }
        };

        // --- Pipeline Settings ---
        let starting_credits = match lookup("STARTING_CREDITS") {
            Some(v) => v.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("STARTING_CREDITS".to_string(), e.to_string())
            })?,
            None => DEFAULT_STARTING_CREDITS,
        };

        let stage_duration_scale = match lookup("STAGE_DURATION_SCALE") {
            Some(v) => {
                let scale = v.parse::<f64>().map_err(|e| {
                    ConfigError::InvalidValue("STAGE_DURATION_SCALE".to_string(), e.to_string())
                })?;
                if !scale.is_finite() || scale < 0.0 {
                    return Err(ConfigError::InvalidValue(
                        "STAGE_DURATION_SCALE".to_string(),
                        format!("'{}' must be a non-negative number", v),
                    ));
                }
                scale
            }
            None => 1.0,
        };

        let session_idle_timeout = match lookup("SESSION_IDLE_TIMEOUT_SECS") {
            Some(v) => {
                let secs = v.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue(
                        "SESSION_IDLE_TIMEOUT_SECS".to_string(),
                        e.to_string(),
                    )
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        "SESSION_IDLE_TIMEOUT_SECS".to_string(),
                        "must be at least 1".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        };

        Ok(Self {
            bind_address,
            store,
            log_level,
            starting_credits,
            stage_duration_scale,
            cors_origin,
            session_idle_timeout,
        })
    }
}
