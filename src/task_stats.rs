//! Running timing statistics for a recurring task.

use crate::average::fold_average;
use crate::clock::{Clock, SystemClock};
use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

/// Tracks how long each invocation of a task takes and how often it runs.
///
/// Every call to [`add_sample`](Self::add_sample) folds the invocation's
/// duration and the period since the previous invocation's start into
/// running means. Memory use is constant regardless of the sample count.
///
/// The aggregator is not synchronized; give each task (or thread) its own
/// instance.
pub struct RunningTimeStats<C: Clock = SystemClock> {
    prev_start: C::TimePoint,
    prev_time: f64,
    avg_time: f64,
    max_time: f64,
    avg_period: f64,
    samples: u64,
    _clock: PhantomData<C>,
}

impl<C: Clock> RunningTimeStats<C> {
    pub fn new() -> Self {
        Self {
            prev_start: C::epoch(),
            prev_time: 0.0,
            avg_time: 0.0,
            max_time: 0.0,
            avg_period: 0.0,
            samples: 0,
            _clock: PhantomData,
        }
    }

    /// Records one completed invocation that ran from `start` to `end` and
    /// returns its duration in seconds.
    ///
    /// The period (time since the previous invocation's start) is folded
    /// into [`avg_period`](Self::avg_period) from the second sample on; the
    /// first sample has no real predecessor, so `avg_period` is the mean of
    /// `num_samples() - 1` periods.
    ///
    /// If `end` precedes `start` the returned duration is negative and is
    /// kept as [`prev_time`](Self::prev_time), but it is folded into the
    /// average as zero so the mean never goes below zero.
    pub fn add_sample(&mut self, start: C::TimePoint, end: C::TimePoint) -> f64 {
        let period = C::seconds_between(self.prev_start, start);
        let dt = C::seconds_between(start, end);

        self.prev_start = start;
        self.prev_time = dt;

        let folded = if dt < 0.0 {
            warn!(duration = dt, "Task sample ended before it started; folding as zero.");
            0.0
        } else {
            dt
        };

        self.avg_time = fold_average(self.avg_time, self.samples, folded);
        // Periods lag samples by one: the n-th sample yields the (n-1)-th period.
        if self.samples != 0 {
            self.avg_period = fold_average(self.avg_period, self.samples - 1, period);
        }
        self.samples += 1;

        if dt > self.max_time {
            self.max_time = dt;
        }

        dt
    }

    /// Runs `task`, recording its duration with this aggregator's clock.
    pub fn measure<R>(&mut self, task: impl FnOnce() -> R) -> R {
        let start = C::now();
        let result = task();
        let end = C::now();
        self.add_sample(start, end);
        result
    }

    /// Duration of the most recent sample, in seconds.
    pub fn prev_time(&self) -> f64 {
        self.prev_time
    }

    pub fn avg_time(&self) -> f64 {
        self.avg_time
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    /// Mean time between consecutive invocation starts, in seconds.
    pub fn avg_period(&self) -> f64 {
        self.avg_period
    }

    pub fn num_samples(&self) -> u64 {
        self.samples
    }
}

impl<C: Clock> Default for RunningTimeStats<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Clone for RunningTimeStats<C> {
    fn clone(&self) -> Self {
        Self {
            prev_start: self.prev_start,
            prev_time: self.prev_time,
            avg_time: self.avg_time,
            max_time: self.max_time,
            avg_period: self.avg_period,
            samples: self.samples,
            _clock: PhantomData,
        }
    }
}

impl<C: Clock> fmt::Debug for RunningTimeStats<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningTimeStats")
            .field("prev_time", &self.prev_time)
            .field("avg_time", &self.avg_time)
            .field("max_time", &self.max_time)
            .field("avg_period", &self.avg_period)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}
