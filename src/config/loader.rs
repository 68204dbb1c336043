//! Configuration Loader
//!
//! Layers a TOML file under `SPREADBOT__SECTION__KEY` environment variables,
//! then validates. Every field has a default so a partial file (or none at
//! all) still yields a complete config.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Environment, File, FileFormat};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Leg;
use crate::strategy::params::{StrategyConfig, StrategyConfigError};
use crate::strategy::spread::SpreadKind;

/// Environment prefix for overrides (`SPREADBOT__STRATEGY__WINDOW_SIZE=30`)
pub const ENV_PREFIX: &str = "SPREADBOT";

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pair: PairSection,
    pub strategy: StrategySection,
    pub trading: TradingSection,
    pub runtime: RuntimeSection,
    pub exchange: ExchangeSection,
    pub logging: LoggingSection,
    pub alerts: AlertsSection,
}

/// Traded pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairSection {
    /// Exchange symbol of leg A (base side of the spread)
    pub symbol_a: String,
    /// Exchange symbol of leg B (quote side of the spread)
    pub symbol_b: String,
    /// Asset both symbols are priced and bought in
    pub quote_asset: String,
    /// Spread definition: "ratio" or "log_ratio"
    pub spread: SpreadKind,
}

impl Default for PairSection {
    fn default() -> Self {
        Self {
            symbol_a: "BTCUSDT".to_string(),
            symbol_b: "ETHUSDT".to_string(),
            quote_asset: "USDT".to_string(),
            spread: SpreadKind::Ratio,
        }
    }
}

impl PairSection {
    /// "SYMBOL_A/SYMBOL_B"
    pub fn label(&self) -> String {
        format!("{}/{}", self.symbol_a, self.symbol_b)
    }

    pub fn symbol(&self, leg: Leg) -> &str {
        match leg {
            Leg::A => &self.symbol_a,
            Leg::B => &self.symbol_b,
        }
    }

    /// Asset held when the leg is bought (symbol minus the quote asset)
    pub fn asset(&self, leg: Leg) -> &str {
        let symbol = self.symbol(leg);
        symbol.strip_suffix(self.quote_asset.as_str()).unwrap_or(symbol)
    }
}

/// Strategy configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    /// Rolling window length in samples
    pub window_size: usize,
    /// Z-score beyond which a position opens
    pub entry_threshold: f64,
    /// Exit at mean (0.0) or overshoot (negative)
    pub exit_threshold: f64,
    pub exit_hysteresis: f64,
}

impl Default for StrategySection {
    fn default() -> Self {
        let defaults = StrategyConfig::default();
        Self {
            window_size: defaults.window_size,
            entry_threshold: defaults.entry_threshold,
            exit_threshold: defaults.exit_threshold,
            exit_hysteresis: defaults.exit_hysteresis,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSection {
    /// Paper trading unless explicitly disabled
    pub dry_run: bool,
    /// Quote amount spent per entry
    pub trade_amount_quote: Decimal,
}

impl Default for TradingSection {
    fn default() -> Self {
        Self {
            dry_run: true,
            trade_amount_quote: dec!(150),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Seconds between decision cycles
    pub poll_interval_secs: u64,
    /// Directory holding the position file
    pub data_dir: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            data_dir: "data".to_string(),
        }
    }
}

impl RuntimeSection {
    /// Data directory with `~` expanded
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }
}

/// Exchange REST API section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSection {
    pub api_url: String,
    pub recv_window_ms: u64,
    pub timeout_secs: u64,
    /// Prefer BINANCE_API_KEY in the environment over this field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.binance.com".to_string(),
            recv_window_ms: 5000,
            timeout_secs: 10,
            api_key: None,
            api_secret: None,
        }
    }
}

impl ExchangeSection {
    /// Get API key with environment variable fallback
    pub fn get_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| env_var("BINANCE_API_KEY"))
    }

    /// Get API secret with environment variable fallback
    pub fn get_api_secret(&self) -> Option<String> {
        non_empty(self.api_secret.clone()).or_else(|| env_var("BINANCE_API_SECRET"))
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log to file (in addition to stdout)
    pub log_to_file: bool,
    /// Directory for the daily rolling log file
    pub log_dir: String,
    pub file_prefix: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_dir: "logs".to_string(),
            file_prefix: "spreadbot.log".to_string(),
        }
    }
}

impl LoggingSection {
    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.log_dir).into_owned())
    }
}

/// Alerts configuration section (optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsSection {
    /// Enable Telegram notifications
    pub telegram_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_bot_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    /// Override for the Bot API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_api_url: Option<String>,
}

impl AlertsSection {
    /// Bot token with TELEGRAM_BOT_TOKEN fallback
    pub fn get_bot_token(&self) -> Option<String> {
        non_empty(self.telegram_bot_token.clone()).or_else(|| env_var("TELEGRAM_BOT_TOKEN"))
    }

    /// Chat id with TELEGRAM_CHAT_ID fallback
    pub fn get_chat_id(&self) -> Option<String> {
        non_empty(self.telegram_chat_id.clone()).or_else(|| env_var("TELEGRAM_CHAT_ID"))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_var(key: &str) -> Option<String> {
    non_empty(std::env::var(key).ok())
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
    #[error("Failed to serialize TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid strategy parameters: {0}")]
    Strategy(#[from] StrategyConfigError),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file layered under the process
/// environment. A `.env` file in the working directory is read first.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    load_with_env(path, None)
}

/// Load with an explicit environment map instead of the process
/// environment (`None` reads the process environment).
pub fn load_with_env<P: AsRef<Path>>(
    path: P,
    env: Option<HashMap<String, String>>,
) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let settings = config::Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Write the default configuration as TOML
pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy_config().validate()?;

        // Validate pair
        if self.pair.symbol_a.is_empty() || self.pair.symbol_b.is_empty() {
            return Err(ConfigError::ValidationError(
                "symbol_a and symbol_b cannot be empty".to_string(),
            ));
        }

        if self.pair.symbol_a == self.pair.symbol_b {
            return Err(ConfigError::ValidationError(format!(
                "symbol_a and symbol_b must differ, both are {}",
                self.pair.symbol_a
            )));
        }

        if self.pair.quote_asset.is_empty() {
            return Err(ConfigError::ValidationError(
                "quote_asset cannot be empty".to_string(),
            ));
        }

        // Validate trading
        if self.trading.trade_amount_quote <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "trade_amount_quote must be > 0, got {}",
                self.trading.trade_amount_quote
            )));
        }

        // Validate runtime
        if self.runtime.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.runtime.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "data_dir cannot be empty".to_string(),
            ));
        }

        // Validate exchange
        if self.exchange.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "api_url cannot be empty".to_string(),
            ));
        }

        if self.exchange.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }

    /// Pair label used for logs and the position file
    pub fn pair_label(&self) -> String {
        self.pair.label()
    }

    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig::from(self)
    }

    /// Live trading requires both exchange credentials
    pub fn require_credentials(&self) -> Result<(String, String), ConfigError> {
        match (self.exchange.get_api_key(), self.exchange.get_api_secret()) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(ConfigError::ValidationError(
                "live trading needs BINANCE_API_KEY and BINANCE_API_SECRET".to_string(),
            )),
        }
    }
}

// Conversion from Config to StrategyConfig
impl From<&Config> for StrategyConfig {
    fn from(config: &Config) -> Self {
        StrategyConfig {
            window_size: config.strategy.window_size,
            entry_threshold: config.strategy.entry_threshold,
            exit_threshold: config.strategy.exit_threshold,
            exit_hysteresis: config.strategy.exit_hysteresis,
            spread_kind: config.pair.spread,
        }
    }
}
