mod helpers;

use helpers::{assert_close, stats_from};
use procwatch::clock::{SystemClock, UtcClock};
use procwatch::test_utils::FakeClock;
use procwatch::RunningTimeStats;
use std::time::{Duration, UNIX_EPOCH};

#[test]
fn two_sample_scenario() {
    let mut stats = RunningTimeStats::<FakeClock>::new();

    let dt = stats.add_sample(0.0, 1.0);
    assert_eq!(dt, 1.0);
    assert_eq!(stats.avg_time(), 1.0);
    assert_eq!(stats.max_time(), 1.0);
    assert_eq!(stats.avg_period(), 0.0);

    let dt = stats.add_sample(10.0, 10.5);
    assert_eq!(dt, 0.5);
    assert_eq!(stats.prev_time(), 0.5);
    assert_eq!(stats.avg_time(), 0.75);
    assert_eq!(stats.max_time(), 1.0);
    assert_eq!(stats.avg_period(), 10.0);
    assert_eq!(stats.num_samples(), 2);
}

#[test]
fn identical_durations_converge() {
    let samples: Vec<(f64, f64)> = (0..1000)
        .map(|i| {
            let start = i as f64 * 0.02;
            (start, start + 0.003)
        })
        .collect();
    let stats = stats_from(&samples);

    let d = samples[0].1 - samples[0].0;
    assert_close(stats.avg_time(), d, 1e-9);
    assert_close(stats.max_time(), 0.003, 1e-9);
    assert_close(stats.avg_period(), 0.02, 1e-9);
}

#[test]
fn average_equals_arithmetic_mean() {
    let durations = [0.5, 2.0, 0.125, 7.25, 3.0, 0.0, 1.5, 4.75];
    let samples: Vec<(f64, f64)> = durations
        .iter()
        .enumerate()
        .map(|(i, d)| (i as f64 * 10.0, i as f64 * 10.0 + d))
        .collect();
    let stats = stats_from(&samples);

    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    assert_close(stats.avg_time(), mean, 1e-9);
    assert_close(stats.avg_period(), 10.0, 1e-9);
}

#[test]
fn irregular_periods_average_over_gaps_only() {
    let stats = stats_from(&[(100.0, 100.1), (102.0, 102.1), (108.0, 108.1)]);
    // Gaps are 2s and 6s; the distance from the epoch to the first start is ignored.
    assert_close(stats.avg_period(), 4.0, 1e-9);
}

#[test]
fn max_never_decreases() {
    let mut stats = RunningTimeStats::<FakeClock>::new();
    let mut previous_max = stats.max_time();
    for (i, d) in [0.3, 0.1, 0.9, 0.2, 0.9, 1.4, 0.0].iter().enumerate() {
        let start = i as f64;
        stats.add_sample(start, start + d);
        assert!(stats.max_time() >= previous_max);
        previous_max = stats.max_time();
    }
    assert_close(previous_max, 1.4, 1e-9);
}

#[test]
fn sample_count_increments_by_one() {
    let mut stats = RunningTimeStats::<FakeClock>::new();
    assert_eq!(stats.num_samples(), 0);
    for n in 1..=5u64 {
        stats.add_sample(n as f64, n as f64 + 0.5);
        assert_eq!(stats.num_samples(), n);
    }
}

#[test]
fn negative_duration_does_not_drag_average_below_zero() {
    let mut stats = RunningTimeStats::<FakeClock>::new();
    let dt = stats.add_sample(5.0, 4.0);
    assert_eq!(dt, -1.0);
    assert_eq!(stats.prev_time(), -1.0);
    assert_eq!(stats.avg_time(), 0.0);
    assert_eq!(stats.max_time(), 0.0);
}

#[test]
fn system_clock_samples() {
    let mut stats = RunningTimeStats::<SystemClock>::new();
    let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    stats.add_sample(start, start + Duration::from_millis(250));
    stats.add_sample(start + Duration::from_secs(1), start + Duration::from_millis(1750));

    assert_close(stats.avg_time(), 0.5, 1e-9);
    assert_close(stats.avg_period(), 1.0, 1e-9);
}

#[test]
fn utc_clock_samples() {
    let mut stats = RunningTimeStats::<UtcClock>::new();
    let start = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let end = start + chrono::TimeDelta::milliseconds(40);
    assert_close(stats.add_sample(start, end), 0.04, 1e-9);
}

#[test]
fn independent_instances_on_separate_threads() {
    let handles: Vec<_> = (1..=4)
        .map(|k| {
            std::thread::spawn(move || {
                let mut stats = RunningTimeStats::<FakeClock>::new();
                for i in 0..100 {
                    let start = i as f64;
                    stats.add_sample(start, start + k as f64 * 0.01);
                }
                stats.avg_time()
            })
        })
        .collect();

    for (k, handle) in (1..=4).zip(handles) {
        assert_close(handle.join().unwrap(), k as f64 * 0.01, 1e-9);
    }
}
