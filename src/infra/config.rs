//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument (parsed in main)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::types::PositionOptions;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// gpsd daemon over TCP (JSON protocol)
    Gpsd,
    /// Recorded route replayed fix by fix
    Replay,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub maximum_age_ms: u64,
    #[serde(default)]
    pub enable_high_accuracy: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { timeout_ms: default_timeout_ms(), maximum_age_ms: 0, enable_high_accuracy: false }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Distance at or below which the car counts as found (10 m)
    #[serde(default = "default_arrival_threshold_km")]
    pub arrival_threshold_km: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            arrival_threshold_km: default_arrival_threshold_km(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    15000
}

fn default_arrival_threshold_km() -> f64 {
    0.01
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    #[serde(default = "default_gpsd_addr")]
    pub gpsd_addr: String,
    #[serde(default = "default_replay_file")]
    pub replay_file: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            gpsd_addr: default_gpsd_addr(),
            replay_file: default_replay_file(),
        }
    }
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Gpsd
}

fn default_gpsd_addr() -> String {
    "127.0.0.1:2947".to_string()
}

fn default_replay_file() -> String {
    "route.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the saved car position
    #[serde(default = "default_store_file")]
    pub file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { file: default_store_file() }
    }
}

fn default_store_file() -> String {
    "car_position.json".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    location_timeout_ms: u64,
    location_maximum_age_ms: u64,
    enable_high_accuracy: bool,
    poll_interval_ms: u64,
    arrival_threshold_km: f64,
    provider_kind: ProviderKind,
    gpsd_addr: String,
    replay_file: String,
    store_file: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location_timeout_ms: 5000,
            location_maximum_age_ms: 0,
            enable_high_accuracy: false,
            poll_interval_ms: 15000,
            arrival_threshold_km: 0.01,
            provider_kind: ProviderKind::Gpsd,
            gpsd_addr: "127.0.0.1:2947".to_string(),
            replay_file: "route.jsonl".to_string(),
            store_file: "car_position.json".to_string(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Config path when `--config` is not given: CONFIG_FILE, else the dev config
    pub fn resolve_config_path() -> String {
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let threshold = toml_config.tracking.arrival_threshold_km;
        anyhow::ensure!(
            threshold.is_finite() && threshold >= 0.0,
            "arrival_threshold_km must be a non-negative number, got {}",
            threshold
        );
        anyhow::ensure!(
            toml_config.tracking.poll_interval_ms > 0,
            "poll_interval_ms must be greater than zero"
        );

        Ok(Self {
            location_timeout_ms: toml_config.location.timeout_ms,
            location_maximum_age_ms: toml_config.location.maximum_age_ms,
            enable_high_accuracy: toml_config.location.enable_high_accuracy,
            poll_interval_ms: toml_config.tracking.poll_interval_ms,
            arrival_threshold_km: threshold,
            provider_kind: toml_config.provider.kind,
            gpsd_addr: toml_config.provider.gpsd_addr,
            replay_file: toml_config.provider.replay_file,
            store_file: toml_config.store.file,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Options handed to the location provider on every query
    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: self.enable_high_accuracy,
            timeout: Duration::from_millis(self.location_timeout_ms),
            maximum_age: Duration::from_millis(self.location_maximum_age_ms),
        }
    }

    pub fn location_timeout_ms(&self) -> u64 {
        self.location_timeout_ms
    }

    pub fn location_maximum_age_ms(&self) -> u64 {
        self.location_maximum_age_ms
    }

    pub fn enable_high_accuracy(&self) -> bool {
        self.enable_high_accuracy
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn arrival_threshold_km(&self) -> f64 {
        self.arrival_threshold_km
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider_kind
    }

    pub fn gpsd_addr(&self) -> &str {
        &self.gpsd_addr
    }

    pub fn replay_file(&self) -> &str {
        &self.replay_file
    }

    pub fn store_file(&self) -> &str {
        &self.store_file
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.location_timeout_ms(), 5000);
        assert_eq!(config.location_maximum_age_ms(), 0);
        assert!(!config.enable_high_accuracy());
        assert_eq!(config.poll_interval_ms(), 15000);
        assert_eq!(config.arrival_threshold_km(), 0.01);
        assert_eq!(config.provider_kind(), ProviderKind::Gpsd);
        assert_eq!(config.store_file(), "car_position.json");
    }

    #[test]
    fn test_position_options_match_defaults() {
        assert_eq!(Config::default().position_options(), PositionOptions::default());
    }

    #[test]
    fn test_resolve_config_path_default() {
        if env::var("CONFIG_FILE").is_err() {
            assert_eq!(Config::resolve_config_path(), "config/dev.toml");
        }
    }

    #[test]
    fn test_empty_toml_uses_section_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(toml_config.location.timeout_ms, 5000);
        assert_eq!(toml_config.tracking.poll_interval_ms, 15000);
        assert_eq!(toml_config.provider.kind, ProviderKind::Gpsd);
        assert_eq!(toml_config.store.file, "car_position.json");
    }
}
