//! Configuration management for the risk engine binary

use crate::ScoringConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/risk-engine.toml";

/// Prefix for environment overrides, e.g. `RISK_ENGINE__SCORING__MAX_HISTORY=20`
pub const ENV_PREFIX: &str = "RISK_ENGINE";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub model: ModelConfig,
    pub accounts: AccountsConfig,
    pub logging: LoggingConfig,
}

/// Pretrained classifier artifacts; the rule-based simulator is used when unset
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Logistic model JSON (`weights`, `bias`, `threshold`)
    pub model_path: Option<String>,
    /// Label encoder JSON, column -> label -> code
    pub encoders_path: Option<String>,
}

/// Local account database
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub db_path: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            db_path: "local_db.json".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level for this crate (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file is not an error; every field falls back to its
    /// default. Environment variables override the file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_HISTORY;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scoring.max_history, MAX_HISTORY);
        assert!(!config.scoring.session_isolation);
        assert_eq!(config.scoring.max_sessions, crate::DEFAULT_MAX_SESSIONS);
        assert_eq!(config.scoring.behavioral.velocity_window_seconds, 300.0);
        assert!(config.model.model_path.is_none());
        assert_eq!(config.accounts.db_path, "local_db.json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.scoring.max_history, MAX_HISTORY);
        assert_eq!(config.scoring.behavioral.impossible_speed_kmh, 900.0);
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("risk-engine.toml");
        std::fs::write(
            &path,
            r#"
[scoring]
max_history = 5
session_isolation = true
max_sessions = 64

[scoring.behavioral]
high_frequency_count = 4

[model]
model_path = "models/logistic.json"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.scoring.max_history, 5);
        assert!(config.scoring.session_isolation);
        assert_eq!(config.scoring.max_sessions, 64);
        assert_eq!(config.scoring.behavioral.high_frequency_count, 4);
        assert_eq!(config.scoring.behavioral.moderate_frequency_count, 3);
        assert_eq!(config.model.model_path.as_deref(), Some("models/logistic.json"));
        assert!(config.model.encoders_path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[scoring\nmax_history = ").unwrap();
        assert!(AppConfig::load_from_path(&path).is_err());
    }
}
