use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::OrderIntent;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("API request failed: {0}")]
    ApiError(String),
    #[error("Order rejected by exchange ({code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("Request signing failed: {0}")]
    SigningError(String),
    #[error("No free balance of {0} to release")]
    InsufficientBalance(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Order {order_id} not filled (status {status})")]
    NotFilled { order_id: String, status: String },
}

/// Confirmation that an order intent was fulfilled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: String,
    /// Base asset quantity filled, when the venue reports it
    pub filled_qty: Option<Decimal>,
    /// Quote amount spent or received, when the venue reports it
    pub quote_qty: Option<Decimal>,
    pub simulated: bool,
}

/// Order-intent sink. The decision loop awaits each call before moving on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    /// True when orders are simulated locally (dry run)
    fn is_simulated(&self) -> bool;

    async fn execute(&self, intent: &OrderIntent) -> Result<ExecutionReport, ExecutionError>;
}
