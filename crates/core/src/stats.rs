// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sample statistics for timing benchmarks.
//!
//! The quartiles here are the "weighted" quartiles published to the
//! benchmark dashboards since the first runs. They are not Tukey hinges and
//! not interpolated percentiles; changing them would break comparability with
//! every historical data point, so the index arithmetic below is kept exactly
//! as published.
//!
//! All functions sort internally, so callers may pass samples in collection
//! order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a sample is too small for the requested statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatsError {
    /// The sample has no elements.
    #[error("mean requires at least one data point")]
    EmptySample,

    /// The sample has fewer elements than the statistic needs.
    #[error("variance requires at least two data points, got {0}")]
    InsufficientSample(usize),
}

/// How the median of an even-length sample is taken.
///
/// Dashboards populated before the midpoint fix recorded the lower of the two
/// middle elements; `LowerMiddle` reproduces those numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MedianConvention {
    /// Average of the two middle elements.
    #[default]
    Midpoint,
    /// The element at `(n - 1) / 2`.
    LowerMiddle,
}

/// Arithmetic mean.
pub fn mean(sample: &[f64]) -> Result<f64, StatsError> {
    if sample.is_empty() {
        return Err(StatsError::EmptySample);
    }
    Ok(sample.iter().sum::<f64>() / sample.len() as f64)
}

/// Population standard deviation: `sqrt(sum((x - mean)^2) / n)`.
pub fn population_std_dev(sample: &[f64]) -> Result<f64, StatsError> {
    let n = sample.len();
    if n < 2 {
        return Err(StatsError::InsufficientSample(n));
    }
    let c = mean(sample)?;
    let ss: f64 = sample.iter().map(|x| (x - c).powi(2)).sum();
    Ok((ss / n as f64).sqrt())
}

/// Median of the sample.
pub fn median(sample: &[f64], convention: MedianConvention) -> Result<f64, StatsError> {
    if sample.is_empty() {
        return Err(StatsError::EmptySample);
    }
    Ok(median_sorted(&sorted(sample), convention))
}

/// Weighted lower quartile.
pub fn lower_quartile(sample: &[f64], convention: MedianConvention) -> Result<f64, StatsError> {
    if sample.is_empty() {
        return Err(StatsError::EmptySample);
    }
    let s = sorted(sample);
    let n = s.len();
    let index = (n - 1) / 2;
    let floor = s[0];

    let q1 = if n % 2 == 1 {
        let a = median_or(&s[..index.saturating_sub(1)], floor, convention);
        let b = median_or(&s[..index], floor, convention);
        (a + b) / 2.0
    } else {
        median_or(&s[..index], floor, convention)
    };
    Ok(q1)
}

/// Weighted upper quartile, mirroring [`lower_quartile`] on the tail.
pub fn upper_quartile(sample: &[f64], convention: MedianConvention) -> Result<f64, StatsError> {
    if sample.is_empty() {
        return Err(StatsError::EmptySample);
    }
    let s = sorted(sample);
    let n = s.len();
    let index = (n - 1) / 2;
    let ceiling = s[n - 1];

    let q3 = if n % 2 == 1 {
        let a = median_or(&s[index..], ceiling, convention);
        let b = median_or(&s[index + 1..], ceiling, convention);
        (a + b) / 2.0
    } else {
        median_or(&s[index + 1..], ceiling, convention)
    };
    Ok(q3)
}

fn sorted(sample: &[f64]) -> Vec<f64> {
    let mut s = sample.to_vec();
    s.sort_by(f64::total_cmp);
    s
}

/// `s` must be sorted and non-empty.
fn median_sorted(s: &[f64], convention: MedianConvention) -> f64 {
    let n = s.len();
    let index = (n - 1) / 2;
    if n % 2 == 1 {
        return s[index];
    }
    match convention {
        MedianConvention::Midpoint => (s[index] + s[index + 1]) / 2.0,
        MedianConvention::LowerMiddle => s[index],
    }
}

// Half-slices of samples with three or fewer elements can be empty; they
// collapse onto the sample extreme on that side.
fn median_or(s: &[f64], extreme: f64, convention: MedianConvention) -> f64 {
    if s.is_empty() {
        extreme
    } else {
        median_sorted(s, convention)
    }
}

/// Summary of one timing sample as published per benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Median running time.
    pub median: f64,
    /// Fastest run.
    pub min: f64,
    /// Slowest run.
    pub max: f64,
    /// Weighted lower quartile.
    pub q1: f64,
    /// Weighted upper quartile.
    pub q3: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation, absent for single-run samples.
    pub std_dev: Option<f64>,
    /// Number of runs.
    pub count: usize,
}

impl TimingSummary {
    /// Summarize a non-empty sample.
    pub fn from_sample(sample: &[f64], convention: MedianConvention) -> Result<Self, StatsError> {
        let mean = mean(sample)?;
        let min = sample.iter().copied().fold(f64::INFINITY, f64::min);
        let max = sample.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std_dev = match population_std_dev(sample) {
            Ok(sd) => Some(sd),
            Err(StatsError::InsufficientSample(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(Self {
            median: median(sample, convention)?,
            min,
            max,
            q1: lower_quartile(sample, convention)?,
            q3: upper_quartile(sample, convention)?,
            mean,
            std_dev,
            count: sample.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONVENTIONS: [MedianConvention; 2] =
        [MedianConvention::Midpoint, MedianConvention::LowerMiddle];

    // Small deterministic generator so the ordering property runs over many
    // shapes without pulling in a randomness crate.
    fn samples() -> Vec<Vec<f64>> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut out = Vec::new();
        for len in 1..=17 {
            for _ in 0..8 {
                let mut sample = Vec::with_capacity(len);
                for _ in 0..len {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    sample.push(((state >> 33) % 1000) as f64 / 10.0);
                }
                out.push(sample);
            }
        }
        out
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0]), Ok(2.5));
        assert_eq!(mean(&[]), Err(StatsError::EmptySample));
    }

    #[test]
    fn test_population_std_dev() {
        let sd = population_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
        assert_eq!(
            population_std_dev(&[1.0]),
            Err(StatsError::InsufficientSample(1))
        );
        assert_eq!(
            population_std_dev(&[]),
            Err(StatsError::InsufficientSample(0))
        );
    }

    #[test]
    fn test_median_odd() {
        for convention in CONVENTIONS {
            assert_eq!(median(&[3.0, 1.0, 2.0], convention), Ok(2.0));
        }
    }

    #[test]
    fn test_median_even_conventions() {
        assert_eq!(median(&[2.5, 1.5], MedianConvention::Midpoint), Ok(2.0));
        assert_eq!(median(&[2.5, 1.5], MedianConvention::LowerMiddle), Ok(1.5));
        assert_eq!(
            median(&[4.0, 1.0, 3.0, 2.0], MedianConvention::Midpoint),
            Ok(2.5)
        );
        assert_eq!(
            median(&[4.0, 1.0, 3.0, 2.0], MedianConvention::LowerMiddle),
            Ok(2.0)
        );
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(
            median(&[], MedianConvention::Midpoint),
            Err(StatsError::EmptySample)
        );
    }

    #[test]
    fn test_weighted_quartiles_odd() {
        let sample = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        // index = 3: mean(median([1, 2]), median([1, 2, 3]))
        assert_eq!(
            lower_quartile(&sample, MedianConvention::Midpoint),
            Ok((1.5 + 2.0) / 2.0)
        );
        assert_eq!(
            lower_quartile(&sample, MedianConvention::LowerMiddle),
            Ok((1.0 + 2.0) / 2.0)
        );
        // mean(median([4, 5, 6, 7]), median([5, 6, 7]))
        assert_eq!(
            upper_quartile(&sample, MedianConvention::Midpoint),
            Ok((5.5 + 6.0) / 2.0)
        );
        assert_eq!(
            upper_quartile(&sample, MedianConvention::LowerMiddle),
            Ok((5.0 + 6.0) / 2.0)
        );
    }

    #[test]
    fn test_weighted_quartiles_even() {
        let sample = [8.0, 1.0, 7.0, 2.0, 6.0, 3.0, 5.0, 4.0];
        // index = 3: median([1, 2, 3]) and median([5, 6, 7, 8])
        assert_eq!(lower_quartile(&sample, MedianConvention::Midpoint), Ok(2.0));
        assert_eq!(upper_quartile(&sample, MedianConvention::Midpoint), Ok(6.5));
        assert_eq!(
            upper_quartile(&sample, MedianConvention::LowerMiddle),
            Ok(6.0)
        );
    }

    #[test]
    fn test_quartiles_small_samples() {
        for convention in CONVENTIONS {
            assert_eq!(lower_quartile(&[4.0], convention), Ok(4.0));
            assert_eq!(upper_quartile(&[4.0], convention), Ok(4.0));
            assert_eq!(lower_quartile(&[1.0, 3.0], convention), Ok(1.0));
            assert_eq!(upper_quartile(&[1.0, 3.0], convention), Ok(3.0));
            assert_eq!(lower_quartile(&[1.0, 2.0, 9.0], convention), Ok(1.0));
        }
        assert_eq!(
            upper_quartile(&[1.0, 2.0, 9.0], MedianConvention::Midpoint),
            Ok((5.5 + 9.0) / 2.0)
        );
    }

    #[test]
    fn test_five_number_ordering() {
        for sample in samples() {
            for convention in CONVENTIONS {
                let s = TimingSummary::from_sample(&sample, convention).unwrap();
                assert!(s.min <= s.q1, "{sample:?}: {s:?}");
                assert!(s.q1 <= s.median, "{sample:?}: {s:?}");
                assert!(s.median <= s.q3, "{sample:?}: {s:?}");
                assert!(s.q3 <= s.max, "{sample:?}: {s:?}");
            }
        }
    }

    #[test]
    fn test_order_invariance() {
        for sample in samples() {
            let mut reversed = sample.clone();
            reversed.reverse();
            let mut rotated = sample.clone();
            rotated.rotate_left(sample.len() / 2);

            for convention in CONVENTIONS {
                let expected = TimingSummary::from_sample(&sample, convention).unwrap();
                for other in [&reversed, &rotated] {
                    let got = TimingSummary::from_sample(other, convention).unwrap();
                    assert_eq!(got.median, expected.median);
                    assert_eq!(got.q1, expected.q1);
                    assert_eq!(got.q3, expected.q3);
                }
            }
        }
    }

    #[test]
    fn test_summary_single_run_has_no_std_dev() {
        let s = TimingSummary::from_sample(&[0.25], MedianConvention::Midpoint).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.std_dev, None);
        assert_eq!(s.min, 0.25);
        assert_eq!(s.max, 0.25);
    }

    #[test]
    fn test_summary_empty_fails_loudly() {
        assert_eq!(
            TimingSummary::from_sample(&[], MedianConvention::Midpoint),
            Err(StatsError::EmptySample)
        );
    }

    #[test]
    fn test_median_convention_serde() {
        let c: MedianConvention = serde_json::from_str("\"lower-middle\"").unwrap();
        assert_eq!(c, MedianConvention::LowerMiddle);
        assert_eq!(MedianConvention::default(), MedianConvention::Midpoint);
    }
}
