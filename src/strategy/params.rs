//! Strategy Parameters
//!
//! Configuration for the spread z-score strategy. Read once at startup and
//! immutable for the life of the process.

use serde::{Deserialize, Serialize};

use super::spread::SpreadKind;

/// Main strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Number of spread samples in the rolling window (N)
    pub window_size: usize,
    /// |z| beyond which a position is opened (e.g., 2.0 = 2 std devs)
    pub entry_threshold: f64,
    /// Signed z level, measured in the entry direction, that the spread has
    /// to fall below to close (0.0 = zero cross, negative = overshoot)
    pub exit_threshold: f64,
    /// Extra distance past `exit_threshold` required before closing
    pub exit_hysteresis: f64,
    /// Spread definition, fixed for the process
    pub spread_kind: SpreadKind,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            entry_threshold: 2.0,
            exit_threshold: 0.0,
            exit_hysteresis: 0.0,
            spread_kind: SpreadKind::Ratio,
        }
    }
}

impl StrategyConfig {
    /// Create a new config with custom entry threshold
    pub fn with_entry_threshold(mut self, threshold: f64) -> Self {
        self.entry_threshold = threshold;
        self
    }

    /// Create a new config with custom window size
    pub fn with_window(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Create a new config with custom exit rule
    pub fn with_exit(mut self, threshold: f64, hysteresis: f64) -> Self {
        self.exit_threshold = threshold;
        self.exit_hysteresis = hysteresis;
        self
    }

    /// Effective level the signed z-score must drop below to close
    pub fn exit_level(&self) -> f64 {
        self.exit_threshold - self.exit_hysteresis
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        if self.window_size < 2 || self.window_size > 10_000 {
            return Err(StrategyConfigError::InvalidWindow(self.window_size));
        }
        if !self.entry_threshold.is_finite() || self.entry_threshold <= 0.0 {
            return Err(StrategyConfigError::InvalidEntryThreshold(self.entry_threshold));
        }
        if !self.exit_threshold.is_finite()
            || self.exit_threshold >= self.entry_threshold
            || self.exit_threshold <= -self.entry_threshold
        {
            return Err(StrategyConfigError::InvalidExitThreshold {
                exit: self.exit_threshold,
                entry: self.entry_threshold,
            });
        }
        if !self.exit_hysteresis.is_finite() || self.exit_hysteresis < 0.0 {
            return Err(StrategyConfigError::InvalidHysteresis(self.exit_hysteresis));
        }
        Ok(())
    }
}

/// Strategy validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyConfigError {
    #[error("Invalid window size: {0} (must be 2..=10000)")]
    InvalidWindow(usize),
    #[error("Invalid entry threshold: {0} (must be finite and > 0)")]
    InvalidEntryThreshold(f64),
    #[error("Invalid exit threshold: {exit} (must lie strictly within ±{entry})")]
    InvalidExitThreshold { exit: f64, entry: f64 },
    #[error("Invalid exit hysteresis: {0} (must be finite and >= 0)")]
    InvalidHysteresis(f64),
}
