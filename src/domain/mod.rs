//! Domain Layer - Core types for the pairs-trading bot
//!
//! Pure domain types and logic with no I/O beyond the position file.
//! All external interactions happen through the ports layer.
//!
//! - `price`: price pairs and spread samples
//! - `signal`: the four trading signals
//! - `position`: position state machine and order intents
//! - `position_persistence`: crash recovery for the position record

pub mod price;
pub mod signal;
pub mod position;
pub mod position_persistence;

pub use price::{Leg, PriceError, PricePair, SpreadSample};
pub use signal::Signal;
pub use position::{
    next_state, OrderAction, OrderIntent, OrderSize, PositionMachine, PositionRecord,
    PositionState, Transition,
};
pub use position_persistence::{
    JsonStateStore, MemoryStateStore, PersistError, PersistedState, DEFAULT_STATE_FILE,
};
