//! Configuration for the operations layer.

use std::path::PathBuf;

use directories::ProjectDirs;
use secret_gift_core::{
    AssignmentGenerator, GeneratorConfig, Strategy, DEFAULT_EXHAUSTIVE_CEILING,
    DEFAULT_RETRY_BUDGET, MAX_EXHAUSTIVE_CEILING,
};
use serde::{Deserialize, Serialize};

use crate::error::{OpsError, OpsResult};
use crate::matcher::DEFAULT_TOLERANCE;

/// Environment variable that points at an alternative config file.
pub const CONFIG_FILE_ENV: &str = "SG_CONFIG_FILE";

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const CONFIG_KEYS: &[&str] = &[
    "match_tolerance",
    "strategy",
    "exhaustive_ceiling",
    "retry_budget",
    "backup_dir",
];

/// Configuration for secret-gift operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum feature-vector distance that still counts as the same face.
    #[serde(default = "default_match_tolerance")]
    pub match_tolerance: f64,

    /// Assignment search strategy.
    #[serde(default)]
    pub strategy: Strategy,

    /// Largest group enumerated exhaustively.
    #[serde(default = "default_exhaustive_ceiling")]
    pub exhaustive_ceiling: usize,

    /// Shuffles tried before the backtracking fallback.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: usize,

    /// Where face-data backups are written. Defaults to `.gift/backups`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

fn default_match_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_exhaustive_ceiling() -> usize {
    DEFAULT_EXHAUSTIVE_CEILING
}

fn default_retry_budget() -> usize {
    DEFAULT_RETRY_BUDGET
}

impl Default for Config {
    fn default() -> Self {
        Self {
            match_tolerance: default_match_tolerance(),
            strategy: Strategy::default(),
            exhaustive_ceiling: default_exhaustive_ceiling(),
            retry_budget: default_retry_budget(),
            backup_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from disk with environment overrides.
    pub fn load() -> OpsResult<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                serde_json::from_str(&contents)?
            }
            _ => Self::default(),
        };

        // Override with environment variables
        for (var, key) in [
            ("SG_MATCH_TOLERANCE", "match_tolerance"),
            ("SG_STRATEGY", "strategy"),
            ("SG_EXHAUSTIVE_CEILING", "exhaustive_ceiling"),
            ("SG_RETRY_BUDGET", "retry_budget"),
            ("SG_BACKUP_DIR", "backup_dir"),
        ] {
            if let Ok(value) = std::env::var(var) {
                config
                    .set(key, &value)
                    .map_err(|e| OpsError::Config(format!("{}: {}", var, e)))?;
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> OpsResult<()> {
        if let Some(path) = Self::config_file_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&path, contents)?;
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("com", "secret-gift", "secret-gift")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Generator settings derived from this configuration.
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            strategy: self.strategy,
            exhaustive_ceiling: self.exhaustive_ceiling,
            retry_budget: self.retry_budget,
        }
    }

    /// A generator built from this configuration.
    pub fn generator(&self) -> AssignmentGenerator {
        AssignmentGenerator::new(self.generator_config())
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "match_tolerance" => Some(self.match_tolerance.to_string()),
            "strategy" => Some(self.strategy.to_string()),
            "exhaustive_ceiling" => Some(self.exhaustive_ceiling.to_string()),
            "retry_budget" => Some(self.retry_budget.to_string()),
            "backup_dir" => self.backup_dir.as_ref().map(|p| p.display().to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key.
    pub fn set(&mut self, key: &str, value: &str) -> OpsResult<()> {
        match key {
            "match_tolerance" => {
                let tolerance: f64 = value
                    .parse()
                    .map_err(|_| OpsError::Config(format!("Invalid number: {}", value)))?;
                if !tolerance.is_finite() || tolerance <= 0.0 {
                    return Err(OpsError::Config(format!(
                        "match_tolerance must be a positive number, got {}",
                        value
                    )));
                }
                self.match_tolerance = tolerance;
            }
            "strategy" => {
                self.strategy = value.parse().map_err(OpsError::Config)?;
            }
            "exhaustive_ceiling" => {
                let ceiling: usize = value
                    .parse()
                    .map_err(|_| OpsError::Config(format!("Invalid number: {}", value)))?;
                if ceiling > MAX_EXHAUSTIVE_CEILING {
                    return Err(OpsError::Config(format!(
                        "exhaustive_ceiling must be at most {}",
                        MAX_EXHAUSTIVE_CEILING
                    )));
                }
                self.exhaustive_ceiling = ceiling;
            }
            "retry_budget" => {
                self.retry_budget = value
                    .parse()
                    .map_err(|_| OpsError::Config(format!("Invalid number: {}", value)))?;
            }
            "backup_dir" => {
                self.backup_dir = Some(PathBuf::from(value));
            }
            _ => {
                return Err(OpsError::Config(format!(
                    "Unknown config key: {}. Valid keys: {}",
                    key,
                    CONFIG_KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.match_tolerance, 0.6);
        assert_eq!(config.strategy, Strategy::Auto);
        assert_eq!(config.generator_config(), GeneratorConfig::default());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("strategy", "rejection").unwrap();
        config.set("retry_budget", "50").unwrap();
        config.set("match_tolerance", "0.45").unwrap();

        assert_eq!(config.get("strategy").as_deref(), Some("rejection"));
        assert_eq!(config.get("retry_budget").as_deref(), Some("50"));
        assert_eq!(config.get("match_tolerance").as_deref(), Some("0.45"));
        assert_eq!(config.get("backup_dir"), None);
        assert_eq!(config.generator_config().retry_budget, 50);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("match_tolerance", "-1").is_err());
        assert!(config.set("match_tolerance", "abc").is_err());
        assert!(config.set("exhaustive_ceiling", "13").is_err());
        assert!(config.set("strategy", "greedy").is_err());
        assert!(config.set("colour", "red").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"strategy":"exhaustive"}"#).unwrap();
        assert_eq!(config.strategy, Strategy::Exhaustive);
        assert_eq!(config.exhaustive_ceiling, DEFAULT_EXHAUSTIVE_CEILING);
        assert_eq!(config.match_tolerance, DEFAULT_TOLERANCE);
    }
}
