//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Price feeds (live exchange ticker, historical replay)
//! - Order execution (exchange orders, paper fills)
//! - Notifications (Telegram, logs)
//! - Position state storage

pub mod market_data;
pub mod execution;
pub mod notifier;
pub mod state_store;
pub mod mocks;

// Re-export main traits and types
pub use market_data::{MarketDataError, PriceFeed};
pub use execution::{ExecutionError, ExecutionPort, ExecutionReport};
pub use notifier::{LogNotifier, Notice, Notifier};
pub use state_store::StateStore;
