// src/config.rs

//! Manages broker configuration: loading, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;

/// Standalone vs. clustered deployment, consulted by the reaper's leader gate.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ClusterConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Connection-census tuning.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CensusConfig {
    #[serde(default = "default_census_subject")]
    pub subject: String,
    #[serde(default = "default_census_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            subject: default_census_subject(),
            timeout_secs: default_census_timeout_secs(),
        }
    }
}

fn default_census_subject() -> String {
    "$memphis_conn_status".to_string()
}
fn default_census_timeout_secs() -> u64 {
    50
}

/// Zombie reaper tuning: tick cadence and leader-poll gate.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReaperConfig {
    #[serde(default = "default_reaper_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_leader_poll_interval_secs")]
    pub leader_poll_interval_secs: u64,
    #[serde(default = "default_leader_poll_max_attempts")]
    pub leader_poll_max_attempts: u32,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_reaper_tick_interval_secs(),
            leader_poll_interval_secs: default_leader_poll_interval_secs(),
            leader_poll_max_attempts: default_leader_poll_max_attempts(),
        }
    }
}

fn default_reaper_tick_interval_secs() -> u64 {
    60
}
fn default_leader_poll_interval_secs() -> u64 {
    20
}
fn default_leader_poll_max_attempts() -> u32 {
    4
}

/// Deployment-environment flags, read once at init and folded into process-wide context.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub development: bool,
    #[serde(default)]
    pub sandbox: bool,
}

/// Legacy analytics toggle (see §4.7 step 5 of the design).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Ambient ops surface (`/healthz`, `/metrics`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    8878
}

/// Represents the final, validated broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub census: CensusConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default = "default_broker_version")]
    pub broker_version: String,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            cluster: ClusterConfig::default(),
            census: CensusConfig::default(),
            reaper: ReaperConfig::default(),
            environment: EnvironmentConfig::default(),
            analytics: AnalyticsConfig::default(),
            broker_version: default_broker_version(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    6666
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_broker_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.reaper.tick_interval_secs == 0 {
            return Err(anyhow!("reaper.tick_interval_secs cannot be 0"));
        }
        if self.census.timeout_secs == 0 {
            return Err(anyhow!("census.timeout_secs cannot be 0"));
        }
        if self.cluster.enabled && self.reaper.leader_poll_max_attempts == 0 {
            return Err(anyhow!(
                "reaper.leader_poll_max_attempts cannot be 0 when cluster.enabled is true"
            ));
        }
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(anyhow!("metrics.port cannot be 0 when metrics.enabled is true"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_empty_toml_is_valid() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.census.subject, "$memphis_conn_status");
        assert_eq!(config.census.timeout_secs, 50);
        assert_eq!(config.reaper.tick_interval_secs, 60);
    }

    #[test]
    fn zero_census_timeout_is_rejected() {
        let mut config = Config::default();
        config.census.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn clustered_with_zero_leader_poll_attempts_is_rejected() {
        let mut config = Config::default();
        config.cluster.enabled = true;
        config.reaper.leader_poll_max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
