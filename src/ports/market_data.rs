use async_trait::async_trait;
use thiserror::Error;

use crate::domain::PricePair;

/// Market data error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("REST API error: {0}")]
    RestError(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Feed source error: {0}")]
    SourceError(String),
}

/// Pull-based source of synchronized price pairs.
///
/// `Ok(None)` means the feed is exhausted (end of a replay file); a live
/// feed never returns it.
#[async_trait]
pub trait PriceFeed: Send {
    /// Human readable feed name for logs
    fn describe(&self) -> String;

    /// Fetch the next observation of both legs
    async fn next_pair(&mut self) -> Result<Option<PricePair>, MarketDataError>;
}
