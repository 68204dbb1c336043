//! Decision Loop
//!
//! Pulls price pairs, runs them through the pairs engine, hands any
//! resulting order intent to execution and persists the committed state.
//! One cycle is in flight at a time; shutdown is honored between cycles.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{Notify, RwLock};

use crate::domain::{
    OrderIntent, PersistError, PositionMachine, PositionRecord, PositionState, PriceError,
    PricePair, Signal,
};
use crate::ports::{
    ExecutionError, ExecutionPort, ExecutionReport, MarketDataError, Notice, Notifier, PriceFeed,
    StateStore,
};
use crate::strategy::{
    EngineError, NormalizerError, PairsEngine, StrategyConfig, StrategyConfigError, ZScoreOutcome,
};

/// Errors local to one cycle. None of them stops the loop.
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("Price feed error: {0}")]
    Feed(#[from] MarketDataError),
    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] PriceError),
    #[error("Sample dropped: {0}")]
    OutOfOrder(#[from] NormalizerError),
    #[error("Execution failed for {signal}: {error}")]
    Execution {
        signal: Signal,
        intent: OrderIntent,
        error: ExecutionError,
    },
    #[error("Failed to persist position: {0}")]
    Persistence(#[from] PersistError),
}

impl From<EngineError> for CycleError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidPrice(e) => CycleError::InvalidPrice(e),
            EngineError::OutOfOrder(e) => CycleError::OutOfOrder(e),
        }
    }
}

/// Errors that prevent the loop from starting
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] StrategyConfigError),
    #[error("Failed to load position state: {0}")]
    StateLoad(#[from] PersistError),
}

/// Static settings for one loop
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub strategy: StrategyConfig,
    /// "SYMBOL_A/SYMBOL_B", used in logs and notices
    pub pair_label: String,
    pub trade_amount_quote: Decimal,
    /// Zero disables sleeping (replays)
    pub poll_interval: Duration,
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub pair: PricePair,
    pub spread: f64,
    pub z_score: Option<f64>,
    pub signal: Signal,
    pub state_before: PositionState,
    pub state_after: PositionState,
    pub executed: Option<(OrderIntent, ExecutionReport)>,
}

impl CycleReport {
    pub fn transitioned(&self) -> bool {
        self.executed.is_some()
    }
}

/// Counters kept across a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub transitions: u64,
    /// Execution and persistence failures
    pub failures: u64,
    /// Feed errors, invalid prices and out-of-order samples
    pub skipped: u64,
    pub final_state: PositionState,
    /// Cycles that moved the position, in order
    pub trades: Vec<CycleReport>,
}

/// Cloneable handle that stops a running loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    stop_requested: Arc<RwLock<bool>>,
    wake: Arc<Notify>,
}

impl ShutdownHandle {
    /// Request shutdown. The loop finishes its current cycle and exits; a
    /// sleeping loop wakes immediately.
    pub async fn stop(&self) {
        *self.stop_requested.write().await = true;
        self.wake.notify_one();
        tracing::info!("Stop signal sent to decision loop");
    }

    pub async fn is_stopped(&self) -> bool {
        *self.stop_requested.read().await
    }
}

pub struct DecisionLoop {
    settings: LoopSettings,
    engine: PairsEngine,
    machine: PositionMachine,
    feed: Box<dyn PriceFeed>,
    execution: Box<dyn ExecutionPort>,
    store: Box<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    shutdown: ShutdownHandle,
    summary: RunSummary,
    /// A committed transition whose save failed; retried before any new decision
    pending_persist: bool,
}

impl DecisionLoop {
    /// Build the loop and restore the last persisted position.
    pub fn new(
        settings: LoopSettings,
        feed: Box<dyn PriceFeed>,
        execution: Box<dyn ExecutionPort>,
        store: Box<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, OrchestratorError> {
        let engine = PairsEngine::new(settings.strategy.clone())?;
        let record = store.load_state()?;
        let machine = PositionMachine::new(record, settings.trade_amount_quote);

        tracing::info!(
            "Decision loop ready - pair {}, window {}, entry ±{}, exit {} (hysteresis {}), position {}",
            settings.pair_label,
            settings.strategy.window_size,
            settings.strategy.entry_threshold,
            settings.strategy.exit_threshold,
            settings.strategy.exit_hysteresis,
            record.state
        );

        Ok(Self {
            summary: RunSummary {
                final_state: record.state,
                ..RunSummary::default()
            },
            settings,
            engine,
            machine,
            feed,
            execution,
            store,
            notifier,
            shutdown: ShutdownHandle::default(),
            pending_persist: false,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> PositionState {
        self.machine.state()
    }

    pub fn record(&self) -> &PositionRecord {
        self.machine.record()
    }

    pub fn engine(&self) -> &PairsEngine {
        &self.engine
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn mode_tag(&self) -> &'static str {
        if self.execution.is_simulated() {
            "[DRY RUN] "
        } else {
            ""
        }
    }

    /// Run until the feed is exhausted or shutdown is requested.
    pub async fn run(&mut self) -> RunSummary {
        tracing::info!(
            "Starting decision loop on {} - dry run: {}, poll interval: {:?}",
            self.feed.describe(),
            self.execution.is_simulated(),
            self.settings.poll_interval
        );
        self.notifier.notify(Notice::Startup {
            pair: self.settings.pair_label.clone(),
            dry_run: self.execution.is_simulated(),
            state: self.machine.state(),
        });

        while !self.shutdown.is_stopped().await {
            match self.run_cycle().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::info!("Price feed exhausted");
                    break;
                }
                // Already logged and counted
                Err(_) => {}
            }

            if self.shutdown.is_stopped().await {
                break;
            }

            if !self.settings.poll_interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                    _ = self.shutdown.wake.notified() => {}
                }
            }
        }

        if self.pending_persist && self.retry_persist().is_err() {
            tracing::error!("Stopping with position {} not persisted", self.machine.state());
        }

        self.summary.final_state = self.machine.state();
        tracing::info!(
            "Decision loop stopped - cycles: {}, transitions: {}, failures: {}, skipped: {}, position: {}",
            self.summary.cycles,
            self.summary.transitions,
            self.summary.failures,
            self.summary.skipped,
            self.summary.final_state
        );
        self.notifier.notify(Notice::Shutdown {
            cycles: self.summary.cycles,
            transitions: self.summary.transitions,
            failures: self.summary.failures,
            state: self.summary.final_state,
        });

        self.summary.clone()
    }

    /// Execute one cycle. `Ok(None)` means the feed has nothing more.
    pub async fn run_cycle(&mut self) -> Result<Option<CycleReport>, CycleError> {
        let pair = match self.feed.next_pair().await {
            Ok(Some(pair)) => pair,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.summary.cycles += 1;
                self.summary.skipped += 1;
                tracing::warn!("Cycle skipped, price feed error: {}", e);
                return Err(e.into());
            }
        };
        self.process_pair(pair).await.map(Some)
    }

    /// True while the committed position has not reached the state store
    pub fn persist_pending(&self) -> bool {
        self.pending_persist
    }

    /// Save the position left unsaved by an earlier cycle. While this fails
    /// no sample is evaluated, so no new order can be placed on top of it.
    fn retry_persist(&mut self) -> Result<(), CycleError> {
        match self.store.save_state(self.machine.record()) {
            Ok(()) => {
                self.pending_persist = false;
                tracing::info!("Position {} persisted after earlier failure", self.machine.state());
                Ok(())
            }
            Err(e) => {
                self.summary.failures += 1;
                tracing::error!(
                    "Cycle skipped, position {} still not persisted: {}",
                    self.machine.state(),
                    e
                );
                Err(CycleError::Persistence(e))
            }
        }
    }

    /// Run one observation through the pipeline.
    pub async fn process_pair(&mut self, pair: PricePair) -> Result<CycleReport, CycleError> {
        self.summary.cycles += 1;

        if self.pending_persist {
            self.retry_persist()?;
        }

        let eval = match self.engine.evaluate(&pair, self.machine.record()) {
            Ok(eval) => eval,
            Err(e) => {
                self.summary.skipped += 1;
                tracing::warn!("Cycle skipped at {}: {}", pair.timestamp, e);
                return Err(e.into());
            }
        };

        let state_before = self.machine.state();
        let z_text = match eval.outcome {
            ZScoreOutcome::Ready(z) => format!("{:.4}", z.z_score),
            ZScoreOutcome::Insufficient { have, need } => format!("warming up {}/{}", have, need),
            ZScoreOutcome::Neutral { .. } => "flat window".to_string(),
        };
        tracing::info!(
            "{} A {:.6} | B {:.6} | Spread {:.6} | Z {} | Signal {} | Position {}",
            self.settings.pair_label,
            pair.price_a,
            pair.price_b,
            eval.spread.value,
            z_text,
            eval.signal,
            state_before
        );

        let mut report = CycleReport {
            pair,
            spread: eval.spread.value,
            z_score: eval.z_score(),
            signal: eval.signal,
            state_before,
            state_after: state_before,
            executed: None,
        };

        let transition = match self.machine.propose(eval.signal) {
            Some(t) => t,
            None => {
                if eval.signal != Signal::Hold {
                    tracing::debug!("Signal {} ignored in state {}", eval.signal, state_before);
                }
                return Ok(report);
            }
        };

        tracing::info!(
            "{}{} -> {}: {}",
            self.mode_tag(),
            transition.from,
            transition.to,
            transition.intent
        );

        let execution = match self.execution.execute(&transition.intent).await {
            Ok(execution) => execution,
            Err(error) => {
                self.summary.failures += 1;
                tracing::error!(
                    "{}Order failed for {} ({}): {} - position stays {}",
                    self.mode_tag(),
                    eval.signal,
                    transition.intent,
                    error,
                    state_before
                );
                self.notifier.notify(Notice::ExecutionFailed {
                    signal: eval.signal,
                    intent: transition.intent,
                    error: error.to_string(),
                });
                return Err(CycleError::Execution {
                    signal: eval.signal,
                    intent: transition.intent,
                    error,
                });
            }
        };

        let z_score = eval.z_score().unwrap_or_default();
        self.machine.commit(&transition, z_score, pair.timestamp);
        self.summary.transitions += 1;
        self.summary.final_state = self.machine.state();

        report.state_after = self.machine.state();
        report.executed = Some((transition.intent, execution.clone()));
        self.summary.trades.push(report.clone());

        self.notifier.notify(Notice::Transition {
            signal: eval.signal,
            from: transition.from,
            to: transition.to,
            intent: transition.intent,
            z_score,
            spread: eval.spread.value,
            report: execution,
        });

        // The order is already filled, so the in-memory state stays advanced
        if let Err(e) = self.store.save_state(self.machine.record()) {
            self.pending_persist = true;
            self.summary.failures += 1;
            tracing::error!("Failed to persist position {}: {}", self.machine.state(), e);
            self.notifier.notify(Notice::PersistenceFailed {
                state: self.machine.state(),
                error: e.to_string(),
            });
            return Err(CycleError::Persistence(e));
        }

        Ok(report)
    }
}
