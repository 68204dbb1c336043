//! Price observations
//!
//! A `PricePair` is one synchronized observation of both legs of the pair.
//! A `SpreadSample` is the scalar derived from it by the spread calculator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceError {
    #[error("Invalid price for {leg}: {value} (must be finite and > 0)")]
    InvalidPrice { leg: Leg, value: f64 },
}

/// One of the two legs of the traded pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    /// Base-side asset (bought when the spread is abnormally narrow)
    A,
    /// Quote-side asset (bought when the spread is abnormally wide)
    B,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::A => write!(f, "A"),
            Leg::B => write!(f, "B"),
        }
    }
}

/// Synchronized prices of both legs at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePair {
    pub timestamp: DateTime<Utc>,
    pub price_a: f64,
    pub price_b: f64,
}

impl PricePair {
    pub fn new(timestamp: DateTime<Utc>, price_a: f64, price_b: f64) -> Self {
        Self {
            timestamp,
            price_a,
            price_b,
        }
    }

    /// Reject non-positive, NaN and infinite prices
    pub fn validate(&self) -> Result<(), PriceError> {
        check_price(Leg::A, self.price_a)?;
        check_price(Leg::B, self.price_b)?;
        Ok(())
    }

    /// Price of the given leg
    pub fn price_of(&self, leg: Leg) -> f64 {
        match leg {
            Leg::A => self.price_a,
            Leg::B => self.price_b,
        }
    }
}

fn check_price(leg: Leg, value: f64) -> Result<(), PriceError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PriceError::InvalidPrice { leg, value })
    }
}

/// Spread derived from exactly one `PricePair`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_valid_pair() {
        let pair = PricePair::new(ts(1), 60_000.0, 3_000.0);
        assert!(pair.validate().is_ok());
        assert_eq!(pair.price_of(Leg::A), 60_000.0);
        assert_eq!(pair.price_of(Leg::B), 3_000.0);
    }

    #[test]
    fn test_zero_price_rejected() {
        let pair = PricePair::new(ts(1), 0.0, 3_000.0);
        assert_eq!(
            pair.validate(),
            Err(PriceError::InvalidPrice { leg: Leg::A, value: 0.0 })
        );
    }

    #[test]
    fn test_negative_and_nan_rejected() {
        assert!(PricePair::new(ts(1), 1.0, -2.0).validate().is_err());
        assert!(PricePair::new(ts(1), f64::NAN, 2.0).validate().is_err());
        assert!(PricePair::new(ts(1), 1.0, f64::INFINITY).validate().is_err());
    }
}
