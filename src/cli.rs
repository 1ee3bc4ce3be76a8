//! Command-Line Interface (CLI) argument parsing.
//!
//! Arguments are parsed with `clap` and merged on top of the configuration
//! file and environment variables through the `figment::Provider` impl.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Lightweight CPU, memory and thread telemetry for the running process.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Milliseconds between samples.
    #[arg(short, long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Log level filter (e.g. "debug", "procwatch=trace").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_listen: Option<SocketAddr>,

    /// Log every snapshot.
    #[arg(long)]
    pub log_snapshots: bool,

    /// Print a single JSON snapshot and exit.
    #[arg(long)]
    pub once: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();
        let mut collector = Dict::new();
        let mut metrics = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(interval) = self.interval_ms {
            collector.insert("interval_ms".into(), Value::from(interval));
        }

        // A bare flag can only switch snapshot logging on.
        if self.log_snapshots {
            collector.insert("log_snapshots".into(), Value::from(true));
        }

        if let Some(addr) = self.metrics_listen {
            metrics.insert("enabled".into(), Value::from(true));
            metrics.insert("listen_address".into(), Value::from(addr.to_string()));
        }

        if !collector.is_empty() {
            dict.insert("collector".into(), Value::from(collector));
        }
        if !metrics.is_empty() {
            dict.insert("metrics".into(), Value::from(metrics));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
