//! Pairs Engine
//!
//! Runs one price observation through spread -> z-score -> signal. The
//! engine never touches the position; it reads it to pick the signal and
//! leaves transitions to the caller.

use thiserror::Error;

use crate::domain::{PositionRecord, PriceError, PricePair, Signal, SpreadSample};
use crate::strategy::params::{StrategyConfig, StrategyConfigError};
use crate::strategy::signal_generator::generate_signal;
use crate::strategy::spread::SpreadCalculator;
use crate::strategy::zscore_gate::{NormalizerError, RollingNormalizer, ZScoreOutcome};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidPrice(#[from] PriceError),

    #[error(transparent)]
    OutOfOrder(#[from] NormalizerError),
}

/// Everything derived from one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub pair: PricePair,
    pub spread: SpreadSample,
    pub outcome: ZScoreOutcome,
    pub signal: Signal,
}

impl Evaluation {
    pub fn z_score(&self) -> Option<f64> {
        self.outcome.z_score()
    }
}

#[derive(Debug, Clone)]
pub struct PairsEngine {
    config: StrategyConfig,
    calculator: SpreadCalculator,
    normalizer: RollingNormalizer,
}

impl PairsEngine {
    pub fn new(config: StrategyConfig) -> Result<Self, StrategyConfigError> {
        config.validate()?;
        Ok(Self {
            calculator: SpreadCalculator::new(config.spread_kind),
            normalizer: RollingNormalizer::new(config.window_size),
            config,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &RollingNormalizer {
        &self.normalizer
    }

    /// Evaluate one observation against the current position.
    ///
    /// An invalid price is rejected before the window sees it; an
    /// out-of-order sample is rejected by the normalizer with the window
    /// unchanged.
    pub fn evaluate(
        &mut self,
        pair: &PricePair,
        position: &PositionRecord,
    ) -> Result<Evaluation, EngineError> {
        let spread = self.calculator.compute(pair)?;
        let outcome = self.normalizer.ingest(&spread)?;
        let signal = generate_signal(outcome.z_score(), position, &self.config);

        Ok(Evaluation {
            pair: *pair,
            spread,
            outcome,
            signal,
        })
    }
}
