//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the spreadbot pairs trader.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::adapters::binance::{BinanceClient, BinanceConfig, BinanceExecution, BinanceFeed, SpotMarket};
use crate::adapters::paper::PaperExecution;
use crate::adapters::replay::ReplayFeed;
use crate::adapters::telegram::TelegramNotifier;
use crate::application::{DecisionLoop, LoopSettings, RunSummary};
use crate::config::{load_config, write_default_config, Config, DEFAULT_CONFIG_PATH};
use crate::domain::{JsonStateStore, Leg, MemoryStateStore, PersistedState};
use crate::logging::init_logging;
use crate::ports::{ExecutionPort, LogNotifier, Notifier};

/// Spreadbot - Pairs Trading Mean Reversion Bot
#[derive(Parser, Debug)]
#[command(
    name = "spreadbot",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Pairs trading mean reversion bot",
    long_about = "Spreadbot watches the spread between two spot assets, normalizes it \
                  with a rolling z-score and holds at most one leg at a time, buying \
                  the cheap side when the spread stretches and selling it when the \
                  spread reverts."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the decision loop
    Run(RunCmd),

    /// Show the persisted position
    Status(StatusCmd),

    /// Replay a JSON-lines price file through the strategy
    Backtest(BacktestCmd),

    /// Write a default configuration file
    Init(InitCmd),
}

/// Start decision loop
#[derive(Parser, Debug, Clone)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Force paper trading (no real orders)
    #[arg(short, long, conflicts_with = "live")]
    pub paper: bool,

    /// Enable live trading (requires --i-accept-losses)
    #[arg(long, help = "Enable live trading with real orders")]
    pub live: bool,

    /// Acknowledge risk of financial loss (required for any live run)
    #[arg(long, help = "Acknowledge risk of financial loss")]
    pub i_accept_losses: bool,
}

/// Show persisted position
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, value_name = "FORMAT", default_value = "text")]
    pub format: String,
}

/// Run a backtest over recorded prices
#[derive(Parser, Debug)]
pub struct BacktestCmd {
    /// JSON-lines file with timestamp, price_a and price_b per line
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override rolling window size
    #[arg(long, value_name = "N")]
    pub window: Option<usize>,

    /// Override entry threshold
    #[arg(long, value_name = "Z")]
    pub entry: Option<f64>,

    /// Override exit threshold
    #[arg(long, value_name = "Z", allow_negative_numbers = true)]
    pub exit: Option<f64>,

    /// Print every transition
    #[arg(long)]
    pub trades: bool,
}

/// Write default config
#[derive(Parser, Debug)]
pub struct InitCmd {
    /// Where to write the file
    #[arg(value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Status(cmd) => status_command(cmd, app.verbose, app.debug),
        Command::Backtest(cmd) => backtest_command(cmd, app.verbose, app.debug).await,
        Command::Init(cmd) => init_command(cmd, app.verbose, app.debug),
    }
}

fn load(path: &Path) -> Result<Config> {
    load_config(path).with_context(|| {
        format!(
            "Failed to load configuration from {} (create one with `spreadbot init`)",
            path.display()
        )
    })
}

/// Paper unless `--live`, or the config turns dry-run off and `--paper` was
/// not given. Live mode from either source needs `--i-accept-losses`.
fn resolve_dry_run(cmd: &RunCmd, config: &Config) -> Result<bool> {
    let dry_run = !cmd.live && (cmd.paper || config.trading.dry_run);
    if !dry_run && !cmd.i_accept_losses {
        if cmd.live {
            bail!("--live requires --i-accept-losses");
        }
        bail!("trading.dry_run = false selects live trading; pass --i-accept-losses or --paper");
    }
    Ok(dry_run)
}

fn binance_client(config: &Config, credentials: Option<(String, String)>) -> Result<BinanceClient> {
    let (api_key, api_secret) = match credentials {
        Some((key, secret)) => (Some(key), Some(secret)),
        None => (None, None),
    };
    BinanceClient::new(BinanceConfig {
        api_base_url: config.exchange.api_url.clone(),
        api_key,
        api_secret,
        recv_window_ms: config.exchange.recv_window_ms,
        timeout: Duration::from_secs(config.exchange.timeout_secs),
        ..BinanceConfig::default()
    })
    .context("Failed to create Binance client")
}

fn print_banner(config: &Config, dry_run: bool) {
    println!("======================================");
    println!("  Spreadbot {}", env!("CARGO_PKG_VERSION"));
    println!("======================================");
    println!("  Pair:      {}", config.pair_label());
    println!("  Spread:    {}", config.pair.spread);
    println!(
        "  Window:    {} | Entry ±{} | Exit {} (hysteresis {})",
        config.strategy.window_size,
        config.strategy.entry_threshold,
        config.strategy.exit_threshold,
        config.strategy.exit_hysteresis
    );
    println!("  Trade:     {} {}", config.trading.trade_amount_quote, config.pair.quote_asset);
    println!("  Poll:      {}s", config.runtime.poll_interval_secs);
    println!("  Mode:      {}", if dry_run { "PAPER" } else { "LIVE" });
    println!("======================================");

    if dry_run {
        tracing::info!("PAPER TRADING MODE - no real orders");
    } else {
        tracing::warn!("LIVE TRADING MODE - real orders will be placed on {}", config.exchange.api_url);
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run summary");
    println!("  Cycles:       {}", summary.cycles);
    println!("  Transitions:  {}", summary.transitions);
    println!("  Failures:     {}", summary.failures);
    println!("  Skipped:      {}", summary.skipped);
    println!("  Final state:  {}", summary.final_state);
}

/// Handle run command
async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config)?;
    let _guard = init_logging(verbose, debug, Some(&config.logging))?;
    tracing::info!("Config: {}", cmd.config.display());

    let dry_run = resolve_dry_run(&cmd, &config)?;

    let execution: Box<dyn ExecutionPort> = if dry_run {
        Box::new(PaperExecution::new())
    } else {
        let credentials = config
            .require_credentials()
            .context("Live trading needs exchange credentials")?;
        let client = binance_client(&config, Some(credentials))?;
        Box::new(BinanceExecution::new(
            client,
            SpotMarket::new(config.pair.symbol(Leg::A), config.pair.asset(Leg::A)),
            SpotMarket::new(config.pair.symbol(Leg::B), config.pair.asset(Leg::B)),
        ))
    };

    let feed = BinanceFeed::new(
        binance_client(&config, None)?,
        config.pair.symbol_a.clone(),
        config.pair.symbol_b.clone(),
    );

    let notifier: Arc<dyn Notifier> = match TelegramNotifier::from_config(&config.alerts, dry_run) {
        Some(telegram) => Arc::new(telegram),
        None => Arc::new(LogNotifier),
    };

    let data_dir = config.runtime.data_path();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    let store = JsonStateStore::in_dir(&data_dir, config.pair_label());

    let settings = LoopSettings {
        strategy: config.strategy_config(),
        pair_label: config.pair_label(),
        trade_amount_quote: config.trading.trade_amount_quote,
        poll_interval: Duration::from_secs(config.runtime.poll_interval_secs),
    };

    let mut decision_loop = DecisionLoop::new(
        settings,
        Box::new(feed),
        execution,
        Box::new(store),
        notifier,
    )
    .context("Failed to start decision loop")?;

    print_banner(&config, dry_run);
    println!("  Position:  {}", decision_loop.state());

    // Setup Ctrl+C handler
    let handle = decision_loop.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop().await;
    });

    let summary = decision_loop.run().await;
    print_summary(&summary);
    tracing::info!("Spreadbot stopped");
    Ok(())
}

/// Handle status command
fn status_command(cmd: StatusCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config)?;
    let _guard = init_logging(verbose, debug, Some(&config.logging))?;

    let store = JsonStateStore::in_dir(&config.runtime.data_path(), config.pair_label());
    let persisted = PersistedState::load(store.path())
        .with_context(|| format!("Failed to read {}", store.path().display()))?;

    match cmd.format.as_str() {
        "json" => match persisted {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => println!("null"),
        },
        "text" => {
            println!("Pair:        {}", config.pair_label());
            println!("State file:  {}", store.path().display());
            match persisted {
                Some(state) => {
                    if state.pair != config.pair_label() {
                        println!("WARNING: file belongs to pair {}", state.pair);
                    }
                    println!("Position:    {}", state.record.state);
                    if let Some(z) = state.record.entry_zscore {
                        println!("Entry z:     {:.4}", z);
                    }
                    if let Some(at) = state.record.entered_at {
                        println!("Entered at:  {}", at.to_rfc3339());
                    }
                    if let Some(at) = state.record.updated_at {
                        println!("Updated at:  {}", at.to_rfc3339());
                    }
                }
                None => println!("Position:    NONE (no state saved yet)"),
            }
        }
        other => bail!("Unknown format '{}', expected text or json", other),
    }

    Ok(())
}

/// Handle backtest command
async fn backtest_command(cmd: BacktestCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = if cmd.config.exists() {
        load(&cmd.config)?
    } else {
        Config::default()
    };
    let _guard = init_logging(verbose, debug, Some(&config.logging))?;

    let mut strategy = config.strategy_config();
    if let Some(window) = cmd.window {
        strategy = strategy.with_window(window);
    }
    if let Some(entry) = cmd.entry {
        strategy = strategy.with_entry_threshold(entry);
    }
    if let Some(exit) = cmd.exit {
        let hysteresis = strategy.exit_hysteresis;
        strategy = strategy.with_exit(exit, hysteresis);
    }

    let feed = ReplayFeed::open(&cmd.file)
        .await
        .with_context(|| format!("Failed to open price file {}", cmd.file.display()))?;
    tracing::info!("Backtesting {} on {}", config.pair_label(), cmd.file.display());

    let settings = LoopSettings {
        strategy,
        pair_label: config.pair_label(),
        trade_amount_quote: config.trading.trade_amount_quote,
        poll_interval: Duration::ZERO,
    };

    let mut decision_loop = DecisionLoop::new(
        settings,
        Box::new(feed),
        Box::new(PaperExecution::new()),
        Box::new(MemoryStateStore::new()),
        Arc::new(LogNotifier),
    )
    .context("Invalid backtest parameters")?;

    let summary = decision_loop.run().await;

    if cmd.trades {
        println!("Transitions:");
        for trade in &summary.trades {
            println!(
                "  {}  {:<7} {} -> {}  z {}  spread {:.6}",
                trade.pair.timestamp.to_rfc3339(),
                trade.signal.to_string(),
                trade.state_before,
                trade.state_after,
                trade
                    .z_score
                    .map(|z| format!("{:.4}", z))
                    .unwrap_or_else(|| "-".to_string()),
                trade.spread
            );
        }
    }
    print_summary(&summary);

    let entries = summary
        .trades
        .iter()
        .filter(|t| t.state_before.is_flat())
        .count();
    println!("  Entries:      {}", entries);
    println!("  Round trips:  {}", summary.transitions.saturating_sub(entries as u64));
    let quote_spent: Decimal = summary
        .trades
        .iter()
        .filter(|t| t.state_before.is_flat())
        .filter_map(|t| t.executed.as_ref().and_then(|(_, report)| report.quote_qty))
        .sum();
    if quote_spent > Decimal::ZERO {
        println!("  Quote spent:  {} {}", quote_spent, config.pair.quote_asset);
    }

    Ok(())
}

/// Handle init command
fn init_command(cmd: InitCmd, verbose: bool, debug: bool) -> Result<()> {
    let _guard = init_logging(verbose, debug, None)?;

    if cmd.path.exists() && !cmd.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            cmd.path.display()
        );
    }

    write_default_config(&cmd.path)
        .with_context(|| format!("Failed to write {}", cmd.path.display()))?;
    println!("Default configuration written to {}", cmd.path.display());
    println!("Put BINANCE_API_KEY and BINANCE_API_SECRET in .env before running with --live.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_app_parse_run() {
        let args = vec!["spreadbot", "run", "--config", "test.toml"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.config, PathBuf::from("test.toml"));
                assert!(!cmd.paper);
                assert!(!cmd.live);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_app_parse_run_with_live() {
        let args = vec!["spreadbot", "run", "--live", "--i-accept-losses"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.live);
                assert!(cmd.i_accept_losses);
                assert!(!cmd.paper);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_paper_and_live_conflict() {
        let args = vec!["spreadbot", "run", "--paper", "--live"];
        assert!(CliApp::try_parse_from(args).is_err());
    }

    #[test]
    fn test_live_without_accept_is_refused() {
        let cmd = RunCmd {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            paper: false,
            live: true,
            i_accept_losses: false,
        };
        assert!(resolve_dry_run(&cmd, &Config::default()).is_err());
    }

    #[test]
    fn test_dry_run_resolution() {
        let mut config = Config::default();
        let plain = RunCmd {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            paper: false,
            live: false,
            i_accept_losses: false,
        };
        assert!(resolve_dry_run(&plain, &config).unwrap());

        // Config alone selects live mode only with the acknowledgement
        config.trading.dry_run = false;
        assert!(resolve_dry_run(&plain, &config).is_err());
        let accepted = RunCmd {
            i_accept_losses: true,
            ..plain.clone()
        };
        assert!(!resolve_dry_run(&accepted, &config).unwrap());
        let paper = RunCmd { paper: true, ..plain };
        assert!(resolve_dry_run(&paper, &config).unwrap());

        let live = RunCmd {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            paper: false,
            live: true,
            i_accept_losses: true,
        };
        config.trading.dry_run = true;
        assert!(!resolve_dry_run(&live, &config).unwrap());
    }

    #[test]
    fn test_cli_app_parse_status() {
        let args = vec!["spreadbot", "status", "--format", "json"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Status(cmd) => {
                assert_eq!(cmd.format, "json");
                assert_eq!(cmd.config, PathBuf::from(DEFAULT_CONFIG_PATH));
            }
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_cli_app_parse_backtest_with_overrides() {
        let args = vec![
            "spreadbot", "backtest",
            "--file", "prices.jsonl",
            "--window", "30",
            "--entry", "1.5",
            "--exit", "-0.5",
            "--trades",
        ];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Backtest(cmd) => {
                assert_eq!(cmd.file, PathBuf::from("prices.jsonl"));
                assert_eq!(cmd.window, Some(30));
                assert_eq!(cmd.entry, Some(1.5));
                assert_eq!(cmd.exit, Some(-0.5));
                assert!(cmd.trades);
            }
            _ => panic!("Expected Backtest command"),
        }
    }

    #[test]
    fn test_backtest_requires_file() {
        let args = vec!["spreadbot", "backtest"];
        assert!(CliApp::try_parse_from(args).is_err());
    }

    #[test]
    fn test_cli_app_parse_init() {
        let args = vec!["spreadbot", "init", "custom.toml", "--force"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Init(cmd) => {
                assert_eq!(cmd.path, PathBuf::from("custom.toml"));
                assert!(cmd.force);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = vec!["spreadbot", "-v", "--debug", "status"];
        let app = CliApp::try_parse_from(args).unwrap();

        assert!(app.verbose);
        assert!(app.debug);
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        init_command(InitCmd { path: path.clone(), force: false }, false, false).unwrap();
        assert!(path.exists());
        assert!(init_command(InitCmd { path: path.clone(), force: false }, false, false).is_err());
        init_command(InitCmd { path, force: true }, false, false).unwrap();
    }
}
