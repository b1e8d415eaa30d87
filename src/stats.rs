//! Duration sample summaries for call groups
//!
//! The statistics half of aggregation: a set of raw elapsed times is
//! reduced to total/min/max/mean/median, nearest-rank percentiles and
//! population standard deviation. All duration math stays in integer
//! nanoseconds; only the standard deviation is a float.

use std::time::Duration;

/// Aggregated timing statistics for one set of call durations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingSummary {
    /// Number of samples summarized.
    pub invocations: usize,
    /// Sum of all samples.
    pub total: Duration,
    /// Fastest sample.
    pub min: Duration,
    /// Slowest sample.
    pub max: Duration,
    /// `total / invocations`, truncated to whole nanoseconds.
    pub mean: Duration,
    /// Middle sample, or the average of the two middle samples.
    pub median: Duration,
    /// Nearest-rank percentiles.
    pub p50: Duration,
    pub p75: Duration,
    pub p90: Duration,
    pub p99: Duration,
    /// Population standard deviation, in nanoseconds.
    pub std_dev: f64,
}

/// Summarize a set of raw elapsed times.
///
/// Sorts `samples` in place, then computes every statistic over the sorted
/// set. An empty slice yields the all-zero summary.
///
/// Percentiles use the nearest-rank method: the value at index
/// `ceil(n * fraction) - 1` of the sorted samples, clamped to the sample
/// range. For small sample counts distinct percentiles can land on the
/// same sample; this is a rank selection, not an interpolation.
pub fn summarize(samples: &mut [Duration]) -> TimingSummary {
    let count = samples.len();
    if count == 0 {
        return TimingSummary::default();
    }
    samples.sort_unstable();

    let total: Duration = samples.iter().sum();
    let mean = total / count as u32;

    let median = if count % 2 == 0 {
        (samples[count / 2 - 1] + samples[count / 2]) / 2
    } else {
        samples[count / 2]
    };

    // Population variance over nanosecond deviations from the truncated mean.
    let mean_nanos = mean.as_nanos() as f64;
    let variance = samples
        .iter()
        .map(|sample| {
            let deviation = sample.as_nanos() as f64 - mean_nanos;
            deviation * deviation
        })
        .sum::<f64>()
        / count as f64;

    TimingSummary {
        invocations: count,
        total,
        min: samples[0],
        max: samples[count - 1],
        mean,
        median,
        p50: nearest_rank(samples, 0.50),
        p75: nearest_rank(samples, 0.75),
        p90: nearest_rank(samples, 0.90),
        p99: nearest_rank(samples, 0.99),
        std_dev: variance.sqrt(),
    }
}

/// Nearest-rank percentile of a sorted, non-empty sample set.
fn nearest_rank(sorted: &[Duration], fraction: f64) -> Duration {
    let rank = (sorted.len() as f64 * fraction).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&ms| Duration::from_millis(ms)).collect()
    }

    #[test]
    fn test_empty_samples_yield_zero_summary() {
        let summary = summarize(&mut []);
        assert_eq!(summary.invocations, 0);
        assert_eq!(summary.total, Duration::ZERO);
        assert_eq!(summary.min, Duration::ZERO);
        assert_eq!(summary.max, Duration::ZERO);
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn test_single_sample() {
        let mut samples = millis(&[42]);
        let summary = summarize(&mut samples);

        assert_eq!(summary.invocations, 1);
        assert_eq!(summary.total, Duration::from_millis(42));
        assert_eq!(summary.min, Duration::from_millis(42));
        assert_eq!(summary.max, Duration::from_millis(42));
        assert_eq!(summary.mean, Duration::from_millis(42));
        assert_eq!(summary.median, Duration::from_millis(42));
        assert_eq!(summary.p50, Duration::from_millis(42));
        assert_eq!(summary.p99, Duration::from_millis(42));
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn test_arithmetic_series_statistics() {
        // 0ms, 1ms, .. 99ms
        let mut samples = millis(&(0..100).collect::<Vec<_>>());
        let summary = summarize(&mut samples);

        assert_eq!(summary.invocations, 100);
        assert_eq!(summary.total, Duration::from_millis(4950));
        assert_eq!(summary.min, Duration::ZERO);
        assert_eq!(summary.max, Duration::from_millis(99));
        assert_eq!(summary.mean, Duration::from_micros(49_500));
        assert_eq!(summary.median, Duration::from_micros(49_500));
        assert_eq!(summary.p50, Duration::from_millis(49));
        assert_eq!(summary.p75, Duration::from_millis(74));
        assert_eq!(summary.p90, Duration::from_millis(89));
        assert_eq!(summary.p99, Duration::from_millis(98));

        // sigma of 0..n-1 spaced by d is d * sqrt((n^2 - 1) / 12)
        let expected = 1_000_000.0 * (9999.0_f64 / 12.0).sqrt();
        assert!((summary.std_dev - expected).abs() < 1e-6);
    }

    #[test]
    fn test_odd_count_median_is_middle_sample() {
        let mut samples = millis(&[5, 1, 3]);
        let summary = summarize(&mut samples);
        assert_eq!(summary.median, Duration::from_millis(3));
    }

    #[test]
    fn test_even_count_median_averages_middle_samples() {
        let mut samples = millis(&[40, 10, 20, 30]);
        let summary = summarize(&mut samples);
        assert_eq!(summary.median, Duration::from_millis(25));
    }

    #[test]
    fn test_summarize_accepts_unsorted_input() {
        let mut samples = millis(&[90, 10, 50]);
        let summary = summarize(&mut samples);
        assert_eq!(summary.min, Duration::from_millis(10));
        assert_eq!(summary.max, Duration::from_millis(90));
        assert_eq!(summary.p50, Duration::from_millis(50));
    }

    #[test]
    fn test_identical_samples_have_zero_std_dev() {
        let mut samples = millis(&[7, 7, 7, 7]);
        let summary = summarize(&mut samples);
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.min, summary.max);
        assert_eq!(summary.mean, Duration::from_millis(7));
    }

    #[test]
    fn test_percentile_rank_clamps_to_sample_range() {
        let mut samples = millis(&[10, 110]);
        let summary = summarize(&mut samples);
        // ceil(2 * 0.5) - 1 = 0, ceil(2 * 0.99) - 1 = 1
        assert_eq!(summary.p50, Duration::from_millis(10));
        assert_eq!(summary.p99, Duration::from_millis(110));
    }

    #[test]
    fn test_mean_truncates_to_whole_nanoseconds() {
        let mut samples = vec![Duration::from_nanos(1), Duration::from_nanos(2)];
        let summary = summarize(&mut samples);
        assert_eq!(summary.mean, Duration::from_nanos(1));
    }
}
