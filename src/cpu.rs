//! CPU utilization of the current process, derived from tick counters.

use crate::average::fold_average;
use crate::sources::{processor_count, ProcessTimes, TickSnapshot, TickSource};
use tracing::debug;

/// Converts successive tick snapshots into a CPU utilization series.
///
/// Percentages are of total host capacity, so a process saturating every
/// core of a four-core host reads 100 while one saturating a single core
/// reads 25.
pub struct CpuUtilizationTracker<S: TickSource = ProcessTimes> {
    source: S,
    prior: TickSnapshot,
    num_processors: usize,
    samples: u64,
    last_percent: f64,
    avg_percent: f64,
    max_percent: f64,
}

impl CpuUtilizationTracker<ProcessTimes> {
    /// Tracks the calling process using `times(2)`.
    pub fn new() -> Self {
        Self::with_source(ProcessTimes, processor_count())
    }
}

impl Default for CpuUtilizationTracker<ProcessTimes> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TickSource> CpuUtilizationTracker<S> {
    /// Takes the baseline snapshot from `source`. A processor count of zero
    /// is treated as one.
    pub fn with_source(mut source: S, num_processors: usize) -> Self {
        let prior = source.read_ticks();
        Self {
            source,
            prior,
            num_processors: num_processors.max(1),
            samples: 0,
            last_percent: 0.0,
            avg_percent: 0.0,
            max_percent: 0.0,
        }
    }

    /// Reads fresh counters and folds one sample into the statistics.
    ///
    /// When the counters did not move forward (elapsed ticks not positive,
    /// or process ticks went backwards) the previous percentage is reused
    /// for this cycle. The baseline always advances to the new reading.
    pub fn update(&mut self) {
        let now = self.source.read_ticks();

        match utilization(self.prior, now, self.num_processors) {
            Some(percent) => self.last_percent = percent,
            None => debug!(
                prior = ?self.prior,
                current = ?now,
                "Tick counters moved backwards; keeping previous CPU sample."
            ),
        }
        self.prior = now;

        self.avg_percent = fold_average(self.avg_percent, self.samples, self.last_percent);
        self.samples += 1;

        if self.last_percent > self.max_percent {
            self.max_percent = self.last_percent;
        }
    }

    pub fn curr_cpu_percent(&self) -> f64 {
        self.last_percent
    }

    pub fn avg_cpu_percent(&self) -> f64 {
        self.avg_percent
    }

    pub fn max_cpu_percent(&self) -> f64 {
        self.max_percent
    }

    pub fn num_samples(&self) -> u64 {
        self.samples
    }

    pub fn num_processors(&self) -> usize {
        self.num_processors
    }
}

/// Percentage of total host capacity used between two snapshots, or
/// `None` if the counters are not monotonic.
pub fn utilization(prior: TickSnapshot, now: TickSnapshot, num_processors: usize) -> Option<f64> {
    if now.total <= prior.total || now.system < prior.system || now.user < prior.user {
        return None;
    }
    // Summed as floats; two u64 deltas can overflow.
    let busy = (now.system - prior.system) as f64 + (now.user - prior.user) as f64;
    let elapsed = (now.total - prior.total) as f64;
    Some(busy * 100.0 / (elapsed * num_processors.max(1) as f64))
}
