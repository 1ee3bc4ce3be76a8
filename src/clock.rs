//! Time sources for [`RunningTimeStats`](crate::task_stats::RunningTimeStats).
//!
//! The task-timing aggregator never reads a clock on its own when samples
//! are added; it only needs to subtract two time points. The [`Clock`]
//! trait captures exactly that, which lets tests drive the aggregator with
//! hand-written time points.

use chrono::{DateTime, Utc};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of time points that can be subtracted into real seconds.
pub trait Clock {
    type TimePoint: Copy;

    /// The zero value a fresh aggregator uses as its "previous start".
    fn epoch() -> Self::TimePoint;

    /// The current time.
    fn now() -> Self::TimePoint;

    /// Signed seconds from `earlier` to `later`. Negative when `later`
    /// precedes `earlier`.
    fn seconds_between(earlier: Self::TimePoint, later: Self::TimePoint) -> f64;
}

/// Wall-clock time via [`SystemTime`], with the Unix epoch as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type TimePoint = SystemTime;

    fn epoch() -> SystemTime {
        UNIX_EPOCH
    }

    fn now() -> SystemTime {
        SystemTime::now()
    }

    fn seconds_between(earlier: SystemTime, later: SystemTime) -> f64 {
        match later.duration_since(earlier) {
            Ok(d) => d.as_secs_f64(),
            Err(e) => -e.duration().as_secs_f64(),
        }
    }
}

/// Monotonic time via [`Instant`].
///
/// `Instant` has no absolute zero, so the epoch is an anchor captured the
/// first time any code in the process asks for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

static MONOTONIC_ANCHOR: OnceLock<Instant> = OnceLock::new();

impl Clock for MonotonicClock {
    type TimePoint = Instant;

    fn epoch() -> Instant {
        *MONOTONIC_ANCHOR.get_or_init(Instant::now)
    }

    fn now() -> Instant {
        Instant::now()
    }

    fn seconds_between(earlier: Instant, later: Instant) -> f64 {
        if later >= earlier {
            later.duration_since(earlier).as_secs_f64()
        } else {
            -earlier.duration_since(later).as_secs_f64()
        }
    }
}

/// Wall-clock time as `chrono` UTC timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcClock;

impl Clock for UtcClock {
    type TimePoint = DateTime<Utc>;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
        let delta = later - earlier;
        match delta.num_nanoseconds() {
            Some(ns) => ns as f64 / 1e9,
            // Outside +/-292 years the nanosecond count overflows.
            None => delta.num_milliseconds() as f64 / 1e3,
        }
    }
}

/// Raw nanoseconds since the Unix epoch, as carried by trace notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochNanos;

impl Clock for EpochNanos {
    type TimePoint = u64;

    fn epoch() -> u64 {
        0
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn seconds_between(earlier: u64, later: u64) -> f64 {
        if later >= earlier {
            (later - earlier) as f64 / 1e9
        } else {
            -((earlier - later) as f64 / 1e9)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn system_clock_is_signed() {
        let a = UNIX_EPOCH + Duration::from_millis(1500);
        let b = UNIX_EPOCH + Duration::from_millis(4000);
        assert_eq!(SystemClock::seconds_between(a, b), 2.5);
        assert_eq!(SystemClock::seconds_between(b, a), -2.5);
    }

    #[test]
    fn monotonic_epoch_is_stable() {
        assert_eq!(MonotonicClock::epoch(), MonotonicClock::epoch());
        let later = MonotonicClock::now();
        assert!(MonotonicClock::seconds_between(MonotonicClock::epoch(), later) >= 0.0);
    }

    #[test]
    fn utc_clock_measures_from_unix_epoch() {
        let t = DateTime::<Utc>::from_timestamp(10, 500_000_000).unwrap();
        assert_eq!(UtcClock::seconds_between(UtcClock::epoch(), t), 10.5);
        assert_eq!(UtcClock::seconds_between(t, UtcClock::epoch()), -10.5);
    }

    #[test]
    fn epoch_nanos_handles_reversed_order() {
        assert_eq!(EpochNanos::seconds_between(1_000_000_000, 3_500_000_000), 2.5);
        assert_eq!(EpochNanos::seconds_between(3_500_000_000, 1_000_000_000), -2.5);
    }
}
