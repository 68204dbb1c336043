//! Test doubles for the ports.
//!
//! Every double keeps its state behind an `Arc`, so a clone handed to the
//! decision loop still reports back to the test holding the original.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{OrderIntent, PricePair};
use crate::ports::execution::{ExecutionError, ExecutionPort, ExecutionReport};
use crate::ports::market_data::{MarketDataError, PriceFeed};
use crate::ports::notifier::{Notice, Notifier};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Feed that replays a fixed script, then reports exhaustion
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    script: VecDeque<Result<Option<PricePair>, MarketDataError>>,
}

impl ScriptedFeed {
    pub fn new(pairs: impl IntoIterator<Item = PricePair>) -> Self {
        Self {
            script: pairs.into_iter().map(|p| Ok(Some(p))).collect(),
        }
    }

    /// Builder method to append a feed failure
    pub fn with_error(mut self, error: MarketDataError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    /// Builder method to append a pair
    pub fn with_pair(mut self, pair: PricePair) -> Self {
        self.script.push_back(Ok(Some(pair)));
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    fn describe(&self) -> String {
        format!("scripted feed ({} queued)", self.script.len())
    }

    async fn next_pair(&mut self) -> Result<Option<PricePair>, MarketDataError> {
        self.script.pop_front().unwrap_or(Ok(None))
    }
}

/// Execution double that records intents and fails on demand
#[derive(Debug, Clone, Default)]
pub struct RecordingExecution {
    calls: Arc<Mutex<Vec<OrderIntent>>>,
    failures: Arc<Mutex<VecDeque<ExecutionError>>>,
    simulated: bool,
}

impl RecordingExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to mark the double as a dry-run venue
    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    /// Fail the next call with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: ExecutionError) {
        lock(&self.failures).push_back(error);
    }

    /// Get all recorded intents, including failed attempts
    pub fn calls(&self) -> Vec<OrderIntent> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl ExecutionPort for RecordingExecution {
    fn is_simulated(&self) -> bool {
        self.simulated
    }

    async fn execute(&self, intent: &OrderIntent) -> Result<ExecutionReport, ExecutionError> {
        let seq = {
            let mut calls = lock(&self.calls);
            calls.push(*intent);
            calls.len()
        };
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        Ok(ExecutionReport {
            order_id: format!("MOCK-{}", seq),
            filled_qty: None,
            quote_qty: None,
            simulated: self.simulated,
        })
    }
}

/// Notifier that keeps every notice
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}
