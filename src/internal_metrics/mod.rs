//! # Internal Metrics Module
//!
//! This module publishes the collected statistics through the `metrics`
//! facade and, when enabled, exposes them to Prometheus.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics
//!   system. It installs the Prometheus recorder, binds the metrics server
//!   and constructs the `Metrics` handle.
//!
//! - **`Metrics`**: A cloneable set of gauge handles with one method per
//!   thing worth reporting (a process snapshot, host CPU info, loop timing).
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum` server exposing
//!   `/metrics`.
//!
//! - **`SystemCollector`**: (Defined in `system.rs`) The background loop
//!   that samples the process and feeds `Metrics`.

use crate::config::MetricsConfig;
use crate::cpu::CpuUtilizationTracker;
use crate::internal_metrics::server::MetricsServer;
use crate::process_stats::StatsSnapshot;
use crate::sources::TickSource;
use crate::task_stats::RunningTimeStats;
use crate::clock::Clock;
use log::error;
use metrics::{Gauge, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub mod server;
pub mod system;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub cpu_usage_percent: Gauge,
    pub cpu_usage_avg_percent: Gauge,
    pub cpu_usage_max_percent: Gauge,
    pub memory_usage_megabytes: Gauge,
    pub threads: Gauge,
    pub cpu_temperature_celsius: Gauge,
    pub cpu_frequency_hertz: Gauge,
    pub collector_loop_avg_seconds: Gauge,
    pub collector_loop_max_seconds: Gauge,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Registers descriptions for all gauges with the global recorder and
    /// returns handles to them.
    pub fn new() -> Self {
        metrics::describe_gauge!("process_cpu_usage_percent", Unit::Percent, "CPU time used by the process over the last sample, as a percentage of total host capacity.");
        metrics::describe_gauge!("process_cpu_usage_avg_percent", Unit::Percent, "Running mean of process_cpu_usage_percent since startup.");
        metrics::describe_gauge!("process_cpu_usage_max_percent", Unit::Percent, "Highest process_cpu_usage_percent since startup.");
        metrics::describe_gauge!("process_memory_usage_megabytes", "Resident set size of the process.");
        metrics::describe_gauge!("process_threads", Unit::Count, "Number of threads in the process.");
        metrics::describe_gauge!("cpu_temperature_celsius", "CPU temperature, or -1 when no sensor is available.");
        metrics::describe_gauge!("cpu_frequency_hertz", "Current frequency of the monitored cpufreq policy.");
        metrics::describe_gauge!("collector_loop_avg_seconds", Unit::Seconds, "Mean time spent taking one sample.");
        metrics::describe_gauge!("collector_loop_max_seconds", Unit::Seconds, "Longest time spent taking one sample.");
        metrics::describe_histogram!("task_duration_seconds", Unit::Seconds, "Duration of completed profiled tasks, labelled by task.");

        Self {
            cpu_usage_percent: metrics::gauge!("process_cpu_usage_percent"),
            cpu_usage_avg_percent: metrics::gauge!("process_cpu_usage_avg_percent"),
            cpu_usage_max_percent: metrics::gauge!("process_cpu_usage_max_percent"),
            memory_usage_megabytes: metrics::gauge!("process_memory_usage_megabytes"),
            threads: metrics::gauge!("process_threads"),
            cpu_temperature_celsius: metrics::gauge!("cpu_temperature_celsius"),
            cpu_frequency_hertz: metrics::gauge!("cpu_frequency_hertz"),
            collector_loop_avg_seconds: metrics::gauge!("collector_loop_avg_seconds"),
            collector_loop_max_seconds: metrics::gauge!("collector_loop_max_seconds"),
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    /// Used when metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            cpu_usage_percent: Gauge::noop(),
            cpu_usage_avg_percent: Gauge::noop(),
            cpu_usage_max_percent: Gauge::noop(),
            memory_usage_megabytes: Gauge::noop(),
            threads: Gauge::noop(),
            cpu_temperature_celsius: Gauge::noop(),
            cpu_frequency_hertz: Gauge::noop(),
            collector_loop_avg_seconds: Gauge::noop(),
            collector_loop_max_seconds: Gauge::noop(),
        }
    }

    /// Publishes a snapshot together with the tracker's running CPU figures.
    pub fn record_snapshot<S: TickSource>(
        &self,
        snapshot: &StatsSnapshot,
        cpu: &CpuUtilizationTracker<S>,
    ) {
        self.cpu_usage_percent.set(snapshot.cpu_percent as f64);
        self.cpu_usage_avg_percent.set(cpu.avg_cpu_percent());
        self.cpu_usage_max_percent.set(cpu.max_cpu_percent());
        self.memory_usage_megabytes.set(snapshot.mem_usage_mb as f64);
        self.threads.set(snapshot.num_threads as f64);
        self.cpu_temperature_celsius.set(snapshot.cpu_temp as f64);
    }

    pub fn record_cpu_frequency(&self, hertz: f64) {
        self.cpu_frequency_hertz.set(hertz);
    }

    pub fn record_loop_timing<C: Clock>(&self, stats: &RunningTimeStats<C>) {
        self.collector_loop_avg_seconds.set(stats.avg_time());
        self.collector_loop_max_seconds.set(stats.max_time());
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle and an
    /// optional `MetricsServer` with the address it is bound to.
    ///
    /// Any failure along the way is logged and yields a disabled `Metrics`;
    /// monitoring must not stop the host application from starting.
    pub fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Invalid histogram buckets: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        // Bind first so a busy port leaves the global recorder untouched.
        let listener = match std::net::TcpListener::bind(self.config.listen_address) {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        let listener = match listener
            .set_nonblocking(true)
            .and_then(|_| TcpListener::from_std(listener))
        {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to hand metrics listener to tokio: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);

        (metrics, Some((server, addr)))
    }
}
