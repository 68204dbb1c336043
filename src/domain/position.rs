//! Position State Machine
//!
//! The single authoritative record of exposure. At most one leg is held at
//! any time; every change goes through `propose` (pure table lookup) and
//! `commit` (applied only after the execution collaborator confirmed the
//! order intent).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::price::Leg;
use super::signal::Signal;

/// Which asset is currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    /// Flat: all capital in the quote currency
    #[default]
    None,
    HoldingA,
    HoldingB,
}

impl PositionState {
    /// Leg currently held, if any
    pub fn held_leg(&self) -> Option<Leg> {
        match self {
            PositionState::None => None,
            PositionState::HoldingA => Some(Leg::A),
            PositionState::HoldingB => Some(Leg::B),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::None)
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::None => write!(f, "NONE"),
            PositionState::HoldingA => write!(f, "HOLDING_A"),
            PositionState::HoldingB => write!(f, "HOLDING_B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Acquire,
    Release,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Acquire => write!(f, "ACQUIRE"),
            OrderAction::Release => write!(f, "RELEASE"),
        }
    }
}

/// How much of the asset an order intent moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSize {
    /// Spend this amount of the quote currency
    Quote(Decimal),
    /// Sell everything held of the leg
    EntireHolding,
}

impl fmt::Display for OrderSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSize::Quote(amount) => write!(f, "{} quote", amount),
            OrderSize::EntireHolding => write!(f, "entire holding"),
        }
    }
}

/// Request handed to the execution collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub leg: Leg,
    pub action: OrderAction,
    pub size: OrderSize,
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.action, self.leg, self.size)
    }
}

/// A state change proposed for one signal, not yet committed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: PositionState,
    pub to: PositionState,
    pub signal: Signal,
    pub intent: OrderIntent,
}

/// Persisted view of the position.
///
/// `entry_zscore` keeps the z-score observed when the position was opened;
/// its sign is the direction the exit rule measures crossings against.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionRecord {
    pub state: PositionState,
    #[serde(default)]
    pub entry_zscore: Option<f64>,
    #[serde(default)]
    pub entered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PositionRecord {
    pub fn flat() -> Self {
        Self::default()
    }

    /// +1.0 when the position was entered on a positive z-score, -1.0 on a
    /// negative one, `None` when flat.
    ///
    /// Records without an entry z-score fall back to the side implied by the
    /// held leg (A is bought on negative z, B on positive z).
    pub fn entry_sign(&self) -> Option<f64> {
        let implied = match self.state {
            PositionState::None => return None,
            PositionState::HoldingA => -1.0,
            PositionState::HoldingB => 1.0,
        };
        match self.entry_zscore {
            Some(z) if z != 0.0 && z.is_finite() => Some(z.signum()),
            _ => Some(implied),
        }
    }
}

/// Look up the transition table. `None` means the signal is a no-op for
/// this state (HOLD, or a combination the table does not define).
pub fn next_state(state: PositionState, signal: Signal) -> Option<(PositionState, Leg, OrderAction)> {
    match (state, signal) {
        (PositionState::None, Signal::BuyA) => {
            Some((PositionState::HoldingA, Leg::A, OrderAction::Acquire))
        }
        (PositionState::None, Signal::BuyB) => {
            Some((PositionState::HoldingB, Leg::B, OrderAction::Acquire))
        }
        (PositionState::HoldingA, Signal::Close) => {
            Some((PositionState::None, Leg::A, OrderAction::Release))
        }
        (PositionState::HoldingB, Signal::Close) => {
            Some((PositionState::None, Leg::B, OrderAction::Release))
        }
        _ => None,
    }
}

/// Owner of the position record
#[derive(Debug, Clone)]
pub struct PositionMachine {
    record: PositionRecord,
    trade_amount_quote: Decimal,
}

impl PositionMachine {
    pub fn new(record: PositionRecord, trade_amount_quote: Decimal) -> Self {
        Self {
            record,
            trade_amount_quote,
        }
    }

    pub fn state(&self) -> PositionState {
        self.record.state
    }

    pub fn record(&self) -> &PositionRecord {
        &self.record
    }

    /// Propose the transition for `signal` without changing anything.
    pub fn propose(&self, signal: Signal) -> Option<Transition> {
        let from = self.record.state;
        let (to, leg, action) = next_state(from, signal)?;
        let size = match action {
            OrderAction::Acquire => OrderSize::Quote(self.trade_amount_quote),
            OrderAction::Release => OrderSize::EntireHolding,
        };
        Some(Transition {
            from,
            to,
            signal,
            intent: OrderIntent { leg, action, size },
        })
    }

    /// Apply a confirmed transition.
    ///
    /// Returns `false` and leaves the record untouched when the transition
    /// was proposed against a state that is no longer current.
    pub fn commit(&mut self, transition: &Transition, zscore: f64, at: DateTime<Utc>) -> bool {
        if transition.from != self.record.state {
            tracing::warn!(
                "Stale transition {} -> {} ignored (current state {})",
                transition.from,
                transition.to,
                self.record.state
            );
            return false;
        }

        self.record = if transition.to.is_flat() {
            PositionRecord {
                state: PositionState::None,
                entry_zscore: None,
                entered_at: None,
                updated_at: Some(at),
            }
        } else {
            PositionRecord {
                state: transition.to,
                entry_zscore: Some(zscore),
                entered_at: Some(at),
                updated_at: Some(at),
            }
        };

        tracing::info!("State transition: {} -> {}", transition.from, transition.to);
        true
    }
}
