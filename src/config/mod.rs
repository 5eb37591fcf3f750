//! # Configuration Management Module
//!
//! Loads, validates and writes the TOML configuration used by the `mushcraft`
//! binary. Every section has serde defaults so a partial file is enough.
//!
//! ## Configuration Structure
//!
//! - [`HarvestConfig`] - Tick pacing and strike power for harvest jobs
//! - [`TreeConfig`] - Hit points and yield of newly planted trees
//! - [`Prototype`] entries under `[prototypes.<kind>]` - spawnable object templates
//! - [`StorageConfig`] - Where the sled object store lives
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [harvest]
//! tick_interval_units = 2
//! time_unit_ms = 1000
//! strike_power = 5
//! access_verb = "harvest"
//!
//! [tree]
//! max_hp = 20
//! yield_kind = "log"
//! yield_amount = 3
//!
//! [prototypes.log]
//! name = "Log"
//! description = "A generic log."
//! stackable = true
//!
//! [storage]
//! data_dir = "data/mushcraft"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::fs;

use crate::tmush::harvest::{HarvestSettings, HarvestTarget};
use crate::tmush::types::{default_prototypes, Prototype, HARVEST_VERB};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Scheduler time units between strikes.
    #[serde(default = "default_tick_interval_units")]
    pub tick_interval_units: u32,
    /// Wall-clock length of one time unit.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
    /// Hit points removed per strike.
    #[serde(default = "default_strike_power")]
    pub strike_power: u32,
    /// Capability verb checked before a harvest starts.
    #[serde(default = "default_access_verb")]
    pub access_verb: String,
}

fn default_tick_interval_units() -> u32 {
    2
}

fn default_time_unit_ms() -> u64 {
    1000
}

fn default_strike_power() -> u32 {
    5
}

fn default_access_verb() -> String {
    HARVEST_VERB.to_string()
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            tick_interval_units: default_tick_interval_units(),
            time_unit_ms: default_time_unit_ms(),
            strike_power: default_strike_power(),
            access_verb: default_access_verb(),
        }
    }
}

impl HarvestConfig {
    pub fn settings(&self) -> HarvestSettings {
        HarvestSettings {
            interval_units: self.tick_interval_units,
            strike_power: self.strike_power,
            access_verb: self.access_verb.clone(),
        }
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_hp: u32,
    pub yield_kind: String,
    pub yield_amount: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_hp: 20,
            yield_kind: "log".to_string(),
            yield_amount: 3,
        }
    }
}

impl TreeConfig {
    pub fn target(&self) -> HarvestTarget {
        HarvestTarget::new(self.max_hp, &self.yield_kind, self.yield_amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/mushcraft".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parse `level`, falling back to Info for unknown names.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default = "default_prototypes")]
    pub prototypes: HashMap<String, Prototype>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            harvest: HarvestConfig::default(),
            tree: TreeConfig::default(),
            prototypes: default_prototypes(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the harvest core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.tick_interval_units == 0 {
            return Err(anyhow!("harvest.tick_interval_units must be at least 1"));
        }
        if self.harvest.time_unit_ms == 0 {
            return Err(anyhow!("harvest.time_unit_ms must be at least 1"));
        }
        if self.harvest.access_verb.trim().is_empty() {
            return Err(anyhow!("harvest.access_verb must not be empty"));
        }
        if self.tree.max_hp == 0 {
            return Err(anyhow!("tree.max_hp must be at least 1"));
        }
        if !self.prototypes.contains_key(&self.tree.yield_kind) {
            return Err(anyhow!(
                "tree.yield_kind '{}' has no [prototypes.{}] entry",
                self.tree.yield_kind,
                self.tree.yield_kind
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.harvest.tick_interval_units, 2);
        assert_eq!(config.harvest.strike_power, 5);
        assert_eq!(config.tree.max_hp, 20);
        assert_eq!(config.tree.yield_amount, 3);
        assert!(config.prototypes["log"].stackable);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[harvest]\nstrike_power = 7\n").unwrap();
        assert_eq!(config.harvest.strike_power, 7);
        assert_eq!(config.harvest.tick_interval_units, 2);
        assert_eq!(config.harvest.access_verb, "harvest");
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
        assert!(config.prototypes.contains_key("log"));
    }

    #[test]
    fn test_partial_sections_fill_missing_fields() {
        let config: Config = toml::from_str("[tree]\nmax_hp = 30\n").unwrap();
        assert_eq!(config.tree.max_hp, 30);
        assert_eq!(config.tree.yield_kind, "log");
        assert_eq!(config.tree.yield_amount, 3);
        assert!(config.validate().is_ok());

        let config: Config = toml::from_str("[logging]\nfile = \"x.log\"\n").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file.as_deref(), Some("x.log"));

        let config: Config = toml::from_str("[storage]\n").unwrap();
        assert_eq!(config.storage.data_dir, "data/mushcraft");
    }

    #[test]
    fn test_validate_rejects_unknown_yield() {
        let mut config = Config::default();
        config.tree.yield_kind = "plank".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.harvest.tick_interval_units = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        tokio_test::block_on(Config::create_default(path)).unwrap();
        let config = tokio_test::block_on(Config::load(path)).unwrap();
        assert_eq!(config.harvest.time_unit(), Duration::from_secs(1));
        assert_eq!(config.tree.target().hp(), 20);
    }
}
