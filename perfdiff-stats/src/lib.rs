#![warn(missing_docs)]
//! PerfDiff Statistics
//!
//! The statistic functions the bootstrap engine treats as opaque callbacks
//! (mean, median, coefficient of variation) and the confidence-interval
//! record types shared across the workspace.
//!
//! Statistical edge cases are values, not errors: the mean of zero
//! observations is NaN, and all-equal data yields a zero-width interval.

/// A statistic reducing a value sequence to one number.
pub type StatisticFn = fn(&[f64]) -> f64;

/// Confidence interval for one statistic at one significance level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ci {
    /// Point estimate over the non-resampled data.
    pub metric: f64,
    /// Lower percentile bound.
    pub lower: f64,
    /// Upper percentile bound.
    pub upper: f64,
    /// Confidence level, `1 - significance`.
    pub level: f64,
}

/// Arithmetic mean. NaN for an empty sequence.
pub fn mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

/// Median via the midpoint of the sorted sequence; the average of the two
/// middle elements for even lengths. Zero for an empty sequence.
pub fn median(data: &[f64]) -> f64 {
    match data.len() {
        0 => 0.0,
        1 => data[0],
        n => {
            let mut sorted = data.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            if n % 2 == 1 {
                sorted[n / 2]
            } else {
                (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
            }
        }
    }
}

/// Sample standard deviation (n-1 divisor). NaN below two observations.
pub fn std_dev(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    let m = mean(data);
    (data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

/// Coefficient of variation: sample standard deviation over mean.
pub fn cov(data: &[f64]) -> f64 {
    std_dev(data) / mean(data)
}

/// Clamp a significance level into `[0, 1]`.
pub fn sig_level(level: f64) -> f64 {
    level.clamp(0.0, 1.0)
}
