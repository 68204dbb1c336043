//! Spreadbot - Pairs Trading Mean Reversion Bot Library
//!
//! Trades the spread between two spot assets: a rolling z-score gates
//! entries, and a single-position state machine holds at most one leg.
//!
//! # Modules
//!
//! - `domain`: Core types (PricePair, Signal, PositionMachine, position file)
//! - `ports`: Trait abstractions (PriceFeed, ExecutionPort, StateStore, Notifier)
//! - `strategy`: Spread, rolling normalizer and signal rules
//! - `adapters`: External implementations (Binance, paper, replay, Telegram, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Decision loop
//! - `logging`: tracing subscriber setup

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
pub mod logging;
