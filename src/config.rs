//! Configuration management for procwatch
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, a `procwatch.toml` file,
//! `PROCWATCH_`-prefixed environment variables and command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

const DEFAULT_CONFIG_FILE: &str = "procwatch.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the sampling loop.
    pub collector: CollectorConfig,
    /// Configuration for the Prometheus endpoint.
    pub metrics: MetricsConfig,
    /// Configuration for optional hardware readings.
    pub sensors: SensorsConfig,
}

/// Configuration for the sampling loop.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Milliseconds between samples.
    pub interval_ms: u64,
    /// Log every snapshot at INFO level.
    pub log_snapshots: bool,
}

/// Configuration for the Prometheus endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics`.
    pub enabled: bool,
    /// The address the metrics server binds to.
    pub listen_address: SocketAddr,
}

/// Configuration for optional hardware readings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SensorsConfig {
    /// Read the CPU temperature sensor, if present.
    pub temperature: bool,
    /// Read the CPU brand string and frequency.
    pub cpu_info: bool,
    /// The cpufreq policy whose frequency is reported.
    pub cpu_frequency_policy: usize,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are layered: defaults, the TOML file named by `--config` (or
    /// `procwatch.toml` in the working directory), environment variables
    /// such as `PROCWATCH_COLLECTOR__INTERVAL_MS=500`, then CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("PROCWATCH_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            collector: CollectorConfig::default(),
            metrics: MetricsConfig::default(),
            sensors: SensorsConfig::default(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            log_snapshots: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: SocketAddr::from(([127, 0, 0, 1], 9464)),
        }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            temperature: true,
            cpu_info: true,
            cpu_frequency_policy: 0,
        }
    }
}
