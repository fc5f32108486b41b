//! Configuration management for meterbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use meterbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Polling {} devices", config.devices.ids.len());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `METERBOX__<section>__<key>`
//!
//! Examples:
//! - `METERBOX__TRANSPORT__ENDPOINT=http://collector:8086`
//! - `METERBOX__SCHEDULE__INTERVAL=1m`
//! - `METERBOX__RETENTION__MAX_AGE=48h`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/meterbox.toml`.
//! This can be overridden using the `METERBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::HumanDuration;
pub use models::{
    Config, DevicesConfig, HealthConfig, RetentionConfig, ScheduleConfig, StatusConfig,
    StoreConfig, TransportConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

use crate::messaging::HttpTransportConfig;
use crate::worker::CycleConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`METERBOX__*`)
    /// 2. TOML file (default: `config/meterbox.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or
    /// validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Cycle settings for the orchestrator
    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            devices: self.devices.ids.clone(),
            cycle_timeout: self.schedule.cycle_timeout.as_duration(),
            max_age: self.retention.max_age.as_chrono(),
        }
    }

    /// Client settings for the HTTP collector transport
    pub fn http_transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            endpoint: self.transport.endpoint.clone(),
            request_timeout: self.transport.publish_timeout.as_duration(),
            ..Default::default()
        }
    }
}
