//! Config command implementation.
//!
//! Manages CLI configuration.

use anyhow::Result;
use secret_gift_core::MAX_EXHAUSTIVE_CEILING;
use secret_gift_ops::{Config, CONFIG_KEYS};

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Secret-Gift CLI Configuration");
    println!("{:-<40}", "");

    println!("Match Tolerance:     {}", config.match_tolerance);
    println!("Strategy:            {}", config.strategy);
    println!(
        "Exhaustive Ceiling:  {} (max {})",
        config.exhaustive_ceiling, MAX_EXHAUSTIVE_CEILING
    );
    println!("Retry Budget:        {}", config.retry_budget);
    println!(
        "Backup Directory:    {}",
        config
            .backup_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(.gift/backups)".to_string())
    );

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value.
pub fn set(config: &mut Config, key: &str, value: &str) -> Result<()> {
    config.set(&normalize(key), value)?;
    config.save()?;
    println!("Set {} to: {}", normalize(key), value);
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    let key = normalize(key);
    if !CONFIG_KEYS.contains(&key.as_str()) {
        anyhow::bail!(
            "Unknown config key: {}. Valid keys: {}",
            key,
            CONFIG_KEYS.join(", ")
        );
    }
    let value = config.get(&key).unwrap_or_else(|| "(not set)".to_string());
    println!("{}", value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    Ok(())
}

/// Accept `retry-budget` as well as `retry_budget`.
fn normalize(key: &str) -> String {
    key.replace('-', "_")
}
