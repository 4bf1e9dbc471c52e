//! Application configuration.

use crate::error::{AppError, AppResult};
use crate::paper::PaperConfig;
use scalp_exit::ExitEngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level bot configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Exit engine thresholds and ladders.
    #[serde(default)]
    pub engine: ExitEngineConfig,

    /// Interval between engine cycles (ms). Default: 5 seconds.
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Paper-trading collaborators.
    #[serde(default)]
    pub paper: PaperConfig,
}

fn default_cycle_interval_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: ExitEngineConfig::default(),
            cycle_interval_ms: default_cycle_interval_ms(),
            paper: PaperConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a file if it exists, otherwise fall back to defaults.
    pub fn load(config_path: &str) -> AppResult<Self> {
        if Path::new(config_path).exists() {
            Self::from_file(config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> AppResult<()> {
        if self.cycle_interval_ms == 0 {
            return Err(AppError::Config(
                "cycle_interval_ms must be positive".into(),
            ));
        }
        self.engine.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle_interval_ms, 5_000);
    }

    #[test]
    fn test_partial_toml() {
        let toml_src = r#"
            cycle_interval_ms = 2000

            [engine.eligibility]
            target_profit_pct = 8

            [[paper.positions]]
            market = "0xabc"
            token = "1"
            shares = "100"
            avg_entry_cents = "50"
            bid_cents = "56"
            ask_cents = "58"
        "#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.cycle_interval_ms, 2_000);
        assert_eq!(config.engine.eligibility.target_profit_pct, dec!(8));
        assert_eq!(config.paper.positions.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_valid_defaults() {
        let config = AppConfig::load("/nonexistent/scalp.toml").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle_interval_ms, 5_000);
        assert_eq!(config.engine.history_samples, 20);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = AppConfig::default();
        config.cycle_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
