//! Configuration management for the lobby session client
//!
//! This module handles configuration loading from environment variables or a
//! TOML file, validation, and default values for the session timers.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub session: SessionSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Session timer and directory-facing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Interval between heartbeat pings while hosting, in seconds
    pub heartbeat_interval_seconds: u64,
    /// Interval between poll refreshes while joined, in milliseconds
    pub poll_interval_ms: u64,
    /// Length of directory-issued join codes
    pub join_code_length: usize,
    /// Default result limit for lobby queries
    pub query_page_limit: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "lobby-session".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 15,
            poll_interval_ms: 1100,
            join_code_length: 6,
            query_page_limit: 25,
        }
    }
}

impl SessionSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(interval) = env::var("HEARTBEAT_INTERVAL_SECONDS") {
            config.session.heartbeat_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid HEARTBEAT_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(interval) = env::var("POLL_INTERVAL_MS") {
            config.session.poll_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid POLL_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(length) = env::var("JOIN_CODE_LENGTH") {
            config.session.join_code_length = length
                .parse()
                .map_err(|_| anyhow!("Invalid JOIN_CODE_LENGTH value: {}", length))?;
        }
        if let Ok(limit) = env::var("QUERY_PAGE_LIMIT") {
            config.session.query_page_limit = limit
                .parse()
                .map_err(|_| anyhow!("Invalid QUERY_PAGE_LIMIT value: {}", limit))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.session.heartbeat_interval_seconds == 0 {
            return Err(anyhow!("heartbeat interval must be at least 1 second"));
        }
        if self.session.poll_interval_ms < 100 {
            return Err(anyhow!("poll interval must be at least 100ms"));
        }
        if !(4..=12).contains(&self.session.join_code_length) {
            return Err(anyhow!("join code length must be between 4 and 12"));
        }
        if self.session.query_page_limit == 0 {
            return Err(anyhow!("query page limit must be greater than 0"));
        }
        Ok(())
    }
}
