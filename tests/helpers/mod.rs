pub mod test_metrics;

use procwatch::test_utils::FakeClock;
use procwatch::RunningTimeStats;

/// Relative-or-absolute closeness check used across the suites.
pub fn assert_close(actual: f64, expected: f64, rel: f64) {
    let tolerance = rel * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} (+/- {}), got {}",
        expected,
        tolerance,
        actual
    );
}

/// Feeds `(start, end)` pairs in seconds into a fresh fake-clock aggregator.
pub fn stats_from(samples: &[(f64, f64)]) -> RunningTimeStats<FakeClock> {
    let mut stats = RunningTimeStats::<FakeClock>::new();
    for &(start, end) in samples {
        stats.add_sample(start, end);
    }
    stats
}
