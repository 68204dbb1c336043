//! Paper Execution
//!
//! Dry-run stand-in for the exchange. Every intent is filled immediately
//! with a sequential paper order id; nothing leaves the process.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::domain::{OrderAction, OrderIntent, OrderSize};
use crate::ports::{ExecutionError, ExecutionPort, ExecutionReport};

#[derive(Debug, Default)]
pub struct PaperExecution {
    next_id: AtomicU64,
}

impl PaperExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of simulated fills so far
    pub fn fills(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionPort for PaperExecution {
    fn is_simulated(&self) -> bool {
        true
    }

    async fn execute(&self, intent: &OrderIntent) -> Result<ExecutionReport, ExecutionError> {
        let quote_qty = match (intent.action, intent.size) {
            (OrderAction::Acquire, OrderSize::Quote(quote)) => Some(quote),
            (OrderAction::Release, OrderSize::EntireHolding) => None,
            (action, size) => {
                return Err(ExecutionError::InvalidParameters(format!(
                    "unsupported order: {} with {}",
                    action, size
                )))
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("[DRY RUN] Would {} - simulated fill PAPER-{}", intent, id);

        Ok(ExecutionReport {
            order_id: format!("PAPER-{}", id),
            filled_qty: None,
            quote_qty,
            simulated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Leg;
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_sequential_paper_ids() {
        let paper = PaperExecution::new();
        let buy = OrderIntent {
            leg: Leg::A,
            action: OrderAction::Acquire,
            size: OrderSize::Quote(dec!(150)),
        };
        let sell = OrderIntent {
            leg: Leg::A,
            action: OrderAction::Release,
            size: OrderSize::EntireHolding,
        };

        let first = assert_ok!(tokio_test::block_on(paper.execute(&buy)));
        let second = assert_ok!(tokio_test::block_on(paper.execute(&sell)));
        assert_eq!(first.order_id, "PAPER-1");
        assert_eq!(first.quote_qty, Some(dec!(150)));
        assert!(first.simulated);
        assert_eq!(second.order_id, "PAPER-2");
        assert_eq!(paper.fills(), 2);
        assert!(paper.is_simulated());
    }

    #[test]
    fn test_mismatched_size_rejected() {
        let paper = PaperExecution::new();
        let odd = OrderIntent {
            leg: Leg::B,
            action: OrderAction::Release,
            size: OrderSize::Quote(dec!(10)),
        };
        assert_err!(tokio_test::block_on(paper.execute(&odd)));
        assert_eq!(paper.fills(), 0);
    }
}
