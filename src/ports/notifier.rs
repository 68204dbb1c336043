//! Human-readable notices sent off the decision path.

use crate::domain::{OrderIntent, PositionState, Signal};
use crate::ports::execution::ExecutionReport;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Startup {
        pair: String,
        dry_run: bool,
        state: PositionState,
    },
    Transition {
        signal: Signal,
        from: PositionState,
        to: PositionState,
        intent: OrderIntent,
        z_score: f64,
        spread: f64,
        report: ExecutionReport,
    },
    ExecutionFailed {
        signal: Signal,
        intent: OrderIntent,
        error: String,
    },
    PersistenceFailed {
        state: PositionState,
        error: String,
    },
    Shutdown {
        cycles: u64,
        transitions: u64,
        failures: u64,
        state: PositionState,
    },
}

impl Notice {
    /// Plain text rendering shared by every channel
    pub fn render(&self) -> String {
        match self {
            Notice::Startup { pair, dry_run, state } => {
                let mode = if *dry_run { "PAPER" } else { "LIVE" };
                format!("Spreadbot started\nPair: {}\nMode: {}\nPosition: {}", pair, mode, state)
            }
            Notice::Transition {
                signal,
                from,
                to,
                intent,
                z_score,
                spread,
                report,
            } => format!(
                "{} executed\n{} -> {}\nOrder: {}\nZ-score: {:.4} | Spread: {:.6}\nOrder id: {}",
                signal, from, to, intent, z_score, spread, report.order_id
            ),
            Notice::ExecutionFailed { signal, intent, error } => format!(
                "Order failed for {}\nOrder: {}\nError: {}\nPosition unchanged, will retry",
                signal, intent, error
            ),
            Notice::PersistenceFailed { state, error } => format!(
                "Failed to persist position {}\nError: {}",
                state, error
            ),
            Notice::Shutdown {
                cycles,
                transitions,
                failures,
                state,
            } => format!(
                "Spreadbot stopped\nCycles: {} | Transitions: {} | Failures: {}\nPosition: {}",
                cycles, transitions, failures, state
            ),
        }
    }
}

/// Fire-and-forget notification sink. Implementations must not block the
/// caller and must swallow their own delivery errors.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!("Notice: {}", notice.render().replace('\n', " | "));
    }
}
