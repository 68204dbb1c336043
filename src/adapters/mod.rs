//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Binance: spot ticker feed and signed market orders
//! - Paper: simulated fills for dry runs
//! - Replay: JSON-lines historical price feed
//! - Telegram: chat alerts
//! - CLI: Command-line interface handlers

pub mod binance;
pub mod paper;
pub mod replay;
pub mod telegram;
pub mod cli;

pub use binance::{BinanceClient, BinanceExecution, BinanceFeed};
pub use paper::PaperExecution;
pub use replay::ReplayFeed;
pub use telegram::TelegramNotifier;
pub use cli::CliApp;
