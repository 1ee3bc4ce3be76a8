//! # System Metrics Collector
//!
//! This module defines the `SystemCollector`, the background loop that
//! samples the process at a fixed interval and publishes each snapshot.
//!
//! Each cycle advances the CPU tracker, reads memory, thread count and
//! temperature, reports the CPU frequency, and hands the snapshot both to
//! the `metrics` gauges and to a `watch` channel the embedding application
//! can subscribe to. The collector times its own cycles with a
//! `RunningTimeStats`, so its overhead is itself observable.

use crate::clock::MonotonicClock;
use crate::internal_metrics::Metrics;
use crate::process_stats::{ProcessStats, StatsSnapshot};
use crate::sources::{CpuInfoSource, ProcessTimes, TickSource};
use crate::task_stats::RunningTimeStats;
use log::{debug, info};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

/// Periodically samples a process and publishes the results.
pub struct SystemCollector<S: TickSource = ProcessTimes> {
    stats: ProcessStats<S>,
    cpu_info: Box<dyn CpuInfoSource>,
    metrics: Metrics,
    interval: Duration,
    frequency_policy: usize,
    log_snapshots: bool,
    loop_stats: RunningTimeStats<MonotonicClock>,
    snapshot_tx: watch::Sender<Option<StatsSnapshot>>,
}

impl<S: TickSource> SystemCollector<S> {
    pub fn new(
        stats: ProcessStats<S>,
        cpu_info: Box<dyn CpuInfoSource>,
        metrics: Metrics,
        interval: Duration,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            stats,
            cpu_info,
            metrics,
            interval,
            frequency_policy: 0,
            log_snapshots: false,
            loop_stats: RunningTimeStats::new(),
            snapshot_tx,
        }
    }

    /// Logs every snapshot at INFO level.
    pub fn with_snapshot_logging(mut self, enabled: bool) -> Self {
        self.log_snapshots = enabled;
        self
    }

    /// Reports the frequency of this cpufreq policy.
    pub fn with_frequency_policy(mut self, policy: usize) -> Self {
        self.frequency_policy = policy;
        self
    }

    /// A receiver that always holds the most recent snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<StatsSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Timing statistics of the collector's own sampling cycles.
    pub fn loop_stats(&self) -> &RunningTimeStats<MonotonicClock> {
        &self.loop_stats
    }

    /// Runs one sampling cycle and returns the snapshot it produced.
    pub fn sample(&mut self) -> StatsSnapshot {
        let Self {
            stats,
            cpu_info,
            metrics,
            frequency_policy,
            loop_stats,
            ..
        } = self;

        let snapshot = loop_stats.measure(|| {
            stats.update();
            let snapshot = stats.snapshot();
            metrics.record_snapshot(&snapshot, stats.cpu());
            metrics.record_cpu_frequency(cpu_info.frequency_hz(*frequency_policy));
            snapshot
        });
        self.metrics.record_loop_timing(&self.loop_stats);

        if self.log_snapshots {
            info!(
                "CPU {:.1}% (avg {:.1}%, max {:.1}%) | RSS {:.1} MB | threads {} | temp {:.1}°C",
                snapshot.cpu_percent,
                self.stats.cpu().avg_cpu_percent(),
                self.stats.cpu().max_cpu_percent(),
                snapshot.mem_usage_mb,
                snapshot.num_threads,
                snapshot.cpu_temp
            );
        }
        self.snapshot_tx.send_replace(Some(snapshot));
        snapshot
    }

    /// Runs the sampling loop until the shutdown channel fires.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "System collector started ({} ms interval, {} processors).",
            self.interval.as_millis(),
            self.stats.cpu().num_processors()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("System collector received shutdown signal.");
                    break;
                }
                _ = interval.tick() => {
                    self.sample();
                }
            }
        }

        debug!(
            "System collector took {} samples, {:.6}s avg / {:.6}s max per cycle.",
            self.loop_stats.num_samples(),
            self.loop_stats.avg_time(),
            self.loop_stats.max_time()
        );
    }
}
