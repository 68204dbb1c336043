//! Z-Score Gate
//!
//! Rolling normalizer over the most recent N spread samples.
//!
//! Z-Score Formula: z = (current_spread - rolling_mean) / rolling_std
//!
//! - The window includes the sample being scored
//! - Standard deviation uses the sample divisor (N - 1)
//! - A degenerate window (std ~ 0) yields a neutral outcome, never a
//!   division fault
//! - Samples must arrive in strictly increasing timestamp order

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::domain::SpreadSample;

/// Standard deviations at or below this are treated as zero
pub const MIN_STD_DEV: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizerError {
    #[error("Out-of-order sample: timestamp {got} is not after {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },
}

/// Result of z-score calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreSample {
    pub timestamp: DateTime<Utc>,
    /// Current z-score value
    pub z_score: f64,
    /// Rolling mean used in calculation
    pub mean: f64,
    /// Rolling standard deviation
    pub std_dev: f64,
    /// Spread being scored
    pub spread: f64,
}

/// Outcome of one ingestion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZScoreOutcome {
    /// Window not full yet
    Insufficient { have: usize, need: usize },
    /// Window full but every spread (nearly) identical
    Neutral { mean: f64 },
    Ready(ZScoreSample),
}

impl ZScoreOutcome {
    /// The z-score, if one is defined
    pub fn z_score(&self) -> Option<f64> {
        match self {
            ZScoreOutcome::Ready(sample) => Some(sample.z_score),
            _ => None,
        }
    }

    pub fn sample(&self) -> Option<&ZScoreSample> {
        match self {
            ZScoreOutcome::Ready(sample) => Some(sample),
            _ => None,
        }
    }
}

/// Owner of the spread window
#[derive(Debug, Clone)]
pub struct RollingNormalizer {
    window_size: usize,
    window: VecDeque<f64>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl RollingNormalizer {
    /// Create a normalizer over `window_size` samples
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size + 1),
            last_timestamp: None,
        }
    }

    /// Add a sample to the window and score it.
    ///
    /// A rejected sample leaves the window untouched.
    pub fn ingest(&mut self, sample: &SpreadSample) -> Result<ZScoreOutcome, NormalizerError> {
        if let Some(last) = self.last_timestamp {
            if sample.timestamp <= last {
                return Err(NormalizerError::OutOfOrder {
                    last,
                    got: sample.timestamp,
                });
            }
        }

        self.last_timestamp = Some(sample.timestamp);
        self.window.push_back(sample.value);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }

        if self.window.len() < self.window_size {
            return Ok(ZScoreOutcome::Insufficient {
                have: self.window.len(),
                need: self.window_size,
            });
        }

        let mean = self.window.iter().mean();
        let std_dev = self.window.iter().std_dev();

        tracing::debug!(
            "Window stats: mean={:.8} std={:.8} n={}",
            mean,
            std_dev,
            self.window.len()
        );

        if !std_dev.is_finite() || std_dev <= MIN_STD_DEV {
            return Ok(ZScoreOutcome::Neutral { mean });
        }

        Ok(ZScoreOutcome::Ready(ZScoreSample {
            timestamp: sample.timestamp,
            z_score: (sample.value - mean) / std_dev,
            mean,
            std_dev,
            spread: sample.value,
        }))
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Get number of spreads in window
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Check if window is full
    pub fn is_ready(&self) -> bool {
        self.window.len() >= self.window_size
    }

    /// Timestamp of the last accepted sample
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Current window contents, oldest first (for testing/debugging)
    pub fn spreads(&self) -> Vec<f64> {
        self.window.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn sample(secs: i64, value: f64) -> SpreadSample {
        SpreadSample {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn test_insufficient_until_full() {
        let mut norm = RollingNormalizer::new(5);
        for i in 0..4 {
            let outcome = norm.ingest(&sample(i, 100.0 + i as f64)).unwrap();
            assert_eq!(
                outcome,
                ZScoreOutcome::Insufficient {
                    have: i as usize + 1,
                    need: 5
                }
            );
            assert!(outcome.z_score().is_none());
        }
        assert!(!norm.is_ready());

        let outcome = norm.ingest(&sample(4, 104.0)).unwrap();
        assert!(outcome.z_score().is_some());
        assert!(norm.is_ready());
    }

    #[test]
    fn test_sample_std_and_zscore() {
        let mut norm = RollingNormalizer::new(3);
        norm.ingest(&sample(1, 10.0)).unwrap();
        norm.ingest(&sample(2, 10.0)).unwrap();
        let outcome = norm.ingest(&sample(3, 16.0)).unwrap();

        let z = outcome.sample().copied().unwrap();
        // mean 12, sample variance (4 + 4 + 16) / 2 = 12
        assert_relative_eq!(z.mean, 12.0, epsilon = 1e-12);
        assert_relative_eq!(z.std_dev, 12.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(z.z_score, 4.0 / 12.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(z.spread, 16.0);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut norm = RollingNormalizer::new(3);
        for (i, v) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().enumerate() {
            norm.ingest(&sample(i as i64, *v)).unwrap();
        }
        assert_eq!(norm.len(), 3);
        assert_eq!(norm.spreads(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_zero_std_is_neutral() {
        let mut norm = RollingNormalizer::new(4);
        let mut last = None;
        for i in 0..4 {
            last = Some(norm.ingest(&sample(i, 20.0)).unwrap());
        }
        assert_eq!(last, Some(ZScoreOutcome::Neutral { mean: 20.0 }));
        assert!(last.and_then(|o| o.z_score()).is_none());
    }

    #[test]
    fn test_out_of_order_rejected_window_unchanged() {
        let mut norm = RollingNormalizer::new(3);
        norm.ingest(&sample(10, 1.0)).unwrap();
        norm.ingest(&sample(20, 2.0)).unwrap();

        let err = norm.ingest(&sample(15, 3.0)).unwrap_err();
        assert!(matches!(err, NormalizerError::OutOfOrder { .. }));
        assert_eq!(norm.spreads(), vec![1.0, 2.0]);
        assert_eq!(norm.last_timestamp(), Some(Utc.timestamp_opt(20, 0).unwrap()));
    }

    #[test]
    fn test_duplicate_timestamp_rejected() {
        let mut norm = RollingNormalizer::new(3);
        norm.ingest(&sample(10, 1.0)).unwrap();
        assert!(norm.ingest(&sample(10, 1.0)).is_err());
        assert_eq!(norm.len(), 1);
    }

    #[test]
    fn test_large_magnitude_spreads_stay_stable() {
        // Tiny relative moves on a large level
        let mut norm = RollingNormalizer::new(3);
        norm.ingest(&sample(1, 1e9)).unwrap();
        norm.ingest(&sample(2, 1e9 + 1.0)).unwrap();
        let z = norm.ingest(&sample(3, 1e9 + 2.0)).unwrap().z_score().unwrap();
        assert_relative_eq!(z, 1.0, epsilon = 1e-6);
    }
}
