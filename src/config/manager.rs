//! Configuration Manager

use super::Config;
use crate::Result;
use anyhow::{bail, Context};
use std::path::Path;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file, falling back to defaults when the file
    /// does not exist.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            Ok(config)
        } else {
            tracing::debug!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
    }

    /// Apply environment variable overrides on top of a loaded configuration.
    ///
    /// The connection string is normally supplied this way (MONGODB_URI),
    /// matching how the service is deployed.
    pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
        if let Ok(uri) = std::env::var("MONGODB_URI") {
            config.database.uri = Some(uri);
        }

        if let Ok(app_name) = std::env::var("MONGOLINK_APP_NAME") {
            config.database.app_name = app_name;
        }

        if let Ok(timeout) = std::env::var("MONGOLINK_CONNECT_TIMEOUT") {
            config.database.connect_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid MONGOLINK_CONNECT_TIMEOUT: {}", timeout))?;
        }

        if let Ok(timeout) = std::env::var("MONGOLINK_SHUTDOWN_TIMEOUT") {
            config.database.shutdown_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid MONGOLINK_SHUTDOWN_TIMEOUT: {}", timeout))?;
        }

        if let Ok(log_level) = std::env::var("MONGOLINK_LOG_LEVEL") {
            config.monitoring.log_level = log_level;
        }

        Ok(())
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_database_config()
            .with_context(|| "Database configuration validation failed")?;

        self.validate_monitoring_config()
            .with_context(|| "Monitoring configuration validation failed")?;

        Ok(())
    }

    fn validate_database_config(&self) -> Result<()> {
        let uri = match &self.database.uri {
            Some(uri) if !uri.trim().is_empty() => uri,
            _ => bail!("database.uri must be set (usually via the MONGODB_URI environment variable)"),
        };

        if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
            bail!("database.uri must start with 'mongodb://' or 'mongodb+srv://'");
        }

        if self.database.app_name.is_empty() {
            bail!("database.app_name must not be empty");
        }

        if self.database.connect_timeout.as_millis() == 0 {
            bail!("database.connect_timeout must be greater than 0");
        }

        if self.database.connect_timeout.as_secs() > 300 {
            bail!("database.connect_timeout cannot exceed 5 minutes");
        }

        if self.database.shutdown_timeout.as_millis() == 0 {
            bail!("database.shutdown_timeout must be greater than 0");
        }

        Ok(())
    }

    fn validate_monitoring_config(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.monitoring.log_level.as_str()) {
            bail!(
                "monitoring.log_level must be one of: {}",
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(&mut self, uri: Option<&str>, log_level: Option<&str>) {
        if let Some(uri) = uri {
            self.database.uri = Some(uri.to_string());
            tracing::info!("CLI override: connection string set");
        }

        if let Some(level) = log_level {
            self.monitoring.log_level = level.to_string();
            tracing::info!("CLI override: log level set to {}", level);
        }
    }
}
