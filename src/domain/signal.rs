use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading signal derived from a z-score and the current position state.
///
/// Signals are stateless and never persisted; only the position state
/// machine decides whether a signal is actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    /// Spread abnormally narrow: acquire the base-side asset
    BuyA,
    /// Spread abnormally wide: acquire the quote-side asset
    BuyB,
    /// Spread reverted past the exit band: release the held asset
    Close,
    /// No actionable condition
    Hold,
}

impl Signal {
    /// True for the two entry signals
    pub fn is_entry(&self) -> bool {
        matches!(self, Signal::BuyA | Signal::BuyB)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::BuyA => write!(f, "BUY_A"),
            Signal::BuyB => write!(f, "BUY_B"),
            Signal::Close => write!(f, "CLOSE"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}
