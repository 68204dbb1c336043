//! Binance Spot Adapter
//!
//! REST client plus the price feed and execution ports built on it.

pub mod client;
pub mod execution;
pub mod feed;

pub use client::{BinanceClient, BinanceConfig, BinanceError, MarketAmount, OrderResponse, OrderSide};
pub use execution::{BinanceExecution, SpotMarket};
pub use feed::BinanceFeed;
