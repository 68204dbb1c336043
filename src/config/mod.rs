//! Configuration Module
//!
//! Loads and validates configuration from TOML files and the environment.

pub mod loader;

pub use loader::{
    load_config, load_with_env, write_default_config, AlertsSection, Config, ConfigError,
    ExchangeSection, LoggingSection, PairSection, RuntimeSection, StrategySection,
    TradingSection, DEFAULT_CONFIG_PATH, ENV_PREFIX,
};
