//! Per-channel statistics.
//!
//! Samples are 8-bit, so both the mean and the median are computed from a
//! 256-bin count table with integer arithmetic. Rounding to one decimal is
//! applied to the exact rational value, half away from zero: 0.25 becomes
//! 0.3 and 0.75 becomes 0.8. A median is always an integer or an exact .5,
//! so it never hits a rounding boundary.

use serde::Serialize;
use thiserror::Error;

/// Errors from the statistics computer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// The sample sequence was empty; there is no mean or median to report.
    #[error("cannot compute statistics of an empty sample sequence")]
    EmptyInput,
}

/// Mean and median of one channel of one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelStatistics {
    /// Arithmetic mean, rounded to one decimal
    pub mean: f64,
    /// Median (average of the two middle values for even counts), rounded to one decimal
    pub median: f64,
    /// Smallest sample, used for diagnostics only
    pub min: u8,
    /// Largest sample, used for diagnostics only
    pub max: u8,
}

/// Compute mean and median of a channel's samples.
pub fn compute(samples: &[u8]) -> Result<ChannelStatistics, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::EmptyInput);
    }

    let mut counts = [0u64; 256];
    let mut sum: u64 = 0;
    for &sample in samples {
        counts[sample as usize] += 1;
        sum += sample as u64;
    }

    let n = samples.len() as u64;
    let lower = nth_smallest(&counts, (n - 1) / 2);
    let upper = nth_smallest(&counts, n / 2);

    // Non-empty input guarantees at least one populated bin
    let min = counts.iter().position(|&c| c > 0).unwrap_or(0) as u8;
    let max = counts.iter().rposition(|&c| c > 0).unwrap_or(0) as u8;

    Ok(ChannelStatistics {
        mean: round_ratio_to_tenth(sum, n),
        median: round_ratio_to_tenth(lower + upper, 2),
        min,
        max,
    })
}

/// Value of the k-th smallest sample (0-based) described by a count table.
fn nth_smallest(counts: &[u64; 256], k: u64) -> u64 {
    let mut seen = 0u64;
    for (value, &count) in counts.iter().enumerate() {
        seen += count;
        if seen > k {
            return value as u64;
        }
    }
    255
}

/// Round `numerator / denominator` to one decimal, half away from zero.
fn round_ratio_to_tenth(numerator: u64, denominator: u64) -> f64 {
    let tenths = (numerator * 20 + denominator) / (denominator * 2);
    tenths as f64 / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_one_decimal(value: f64) -> bool {
        let scaled = value * 10.0;
        (scaled - scaled.round()).abs() < 1e-9
    }

    #[test]
    fn test_even_count_extremes() {
        let stats = compute(&[0, 0, 255, 255]).unwrap();
        assert_eq!(stats.mean, 127.5);
        assert_eq!(stats.median, 127.5);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 255);
    }

    #[test]
    fn test_odd_count() {
        let stats = compute(&[10, 20, 30]).unwrap();
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.median, 20.0);
    }

    #[test]
    fn test_median_ignores_input_order() {
        let stats = compute(&[30, 10, 20, 200]).unwrap();
        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.mean, 65.0);
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(compute(&[]), Err(StatsError::EmptyInput));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // 1 / 4 = 0.25 -> 0.3 (half-to-even would give 0.2)
        assert_eq!(compute(&[0, 0, 0, 1]).unwrap().mean, 0.3);
        // 3 / 4 = 0.75 -> 0.8
        assert_eq!(compute(&[0, 1, 1, 1]).unwrap().mean, 0.8);
        // 6 / 25 = 0.24 -> 0.2
        let mut samples = vec![0u8; 19];
        samples.extend_from_slice(&[1; 6]);
        assert_eq!(compute(&samples).unwrap().mean, 0.2);
    }

    #[test]
    fn test_values_stay_in_range_with_one_decimal() {
        // Deterministic pseudo-random sequences of varying length
        let mut state: u32 = 0x9e37_79b9;
        for len in 1..64usize {
            let samples: Vec<u8> = (0..len)
                .map(|_| {
                    state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    (state >> 24) as u8
                })
                .collect();
            let stats = compute(&samples).unwrap();
            for value in [stats.mean, stats.median] {
                assert!((0.0..=255.0).contains(&value), "{} out of range", value);
                assert!(has_one_decimal(value), "{} has more than one decimal", value);
            }
            assert!(stats.min as f64 <= stats.median && stats.median <= stats.max as f64);
        }
    }

    #[test]
    fn test_single_sample() {
        let stats = compute(&[42]).unwrap();
        assert_eq!(stats.mean, 42.0);
        assert_eq!(stats.median, 42.0);
    }
}
