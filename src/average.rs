//! Incremental averaging shared by the CPU and task-timing aggregators.
//!
//! Both aggregators keep only the current mean and the number of samples
//! folded into it, so memory and update cost stay constant no matter how
//! long the owning process runs.

/// Folds `sample` into the running mean `avg`, which currently covers
/// `count` samples, and returns the new mean.
///
/// The update is a weighted blend, `avg * w + sample * (1 - w)` with
/// `w = count / (count + 1)`. The weight is recomputed from the count on
/// every call, so rounding error does not accumulate into a growing term.
/// Callers are responsible for incrementing `count` afterwards.
#[inline]
pub fn fold_average(avg: f64, count: u64, sample: f64) -> f64 {
    let w = count as f64 / (count as f64 + 1.0);
    avg * w + sample * (1.0 - w)
}

/// A running mean together with its sample count.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    value: f64,
    count: u64,
}

impl RunningAverage {
    /// Folds one sample into the mean.
    pub fn push(&mut self, sample: f64) {
        self.value = fold_average(self.value, self.count, sample);
        self.count += 1;
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-9 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn first_sample_becomes_the_mean() {
        assert_eq!(fold_average(123.0, 0, 4.5), 4.5);
    }

    #[test]
    fn running_average_matches_arithmetic_mean() {
        let samples = [3.0, 9.5, 0.25, 17.0, 4.0, 4.0, 11.75, 0.0, 8.125];
        let mut avg = RunningAverage::default();
        for s in samples {
            avg.push(s);
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert_close(avg.value(), mean);
        assert_eq!(avg.count(), samples.len() as u64);
    }

    #[test]
    fn long_constant_stream_does_not_drift() {
        let mut avg = RunningAverage::default();
        for _ in 0..1_000_000 {
            avg.push(0.1);
        }
        assert_close(avg.value(), 0.1);
    }

    #[test]
    fn long_varying_stream_tracks_the_mean() {
        let mut avg = RunningAverage::default();
        let mut sum = 0.0;
        let n = 200_000u64;
        for i in 0..n {
            let x = (i % 97) as f64 * 0.37 + 1.0;
            sum += x;
            avg.push(x);
        }
        assert_close(avg.value(), sum / n as f64);
    }
}
