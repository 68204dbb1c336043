//! Spread Calculator
//!
//! Maps a synchronized price pair to one scalar. The definition is chosen
//! once at construction; the rolling statistics downstream are only
//! meaningful if it never changes mid-run.

use serde::{Deserialize, Serialize};

use crate::domain::{PriceError, PricePair, SpreadSample};

/// Spread definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadKind {
    /// price_a / price_b
    #[default]
    Ratio,
    /// ln(price_a / price_b)
    LogRatio,
}

impl std::fmt::Display for SpreadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpreadKind::Ratio => write!(f, "ratio"),
            SpreadKind::LogRatio => write!(f, "log_ratio"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpreadCalculator {
    kind: SpreadKind,
}

impl SpreadCalculator {
    pub fn new(kind: SpreadKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> SpreadKind {
        self.kind
    }

    /// Compute the spread for one observation
    pub fn compute(&self, pair: &PricePair) -> Result<SpreadSample, PriceError> {
        pair.validate()?;

        let ratio = pair.price_a / pair.price_b;
        let value = match self.kind {
            SpreadKind::Ratio => ratio,
            SpreadKind::LogRatio => ratio.ln(),
        };

        Ok(SpreadSample {
            timestamp: pair.timestamp,
            value,
        })
    }
}
