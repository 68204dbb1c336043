//! Pairs Trading Integration Tests
//!
//! Drives the full pipeline (feed -> engine -> position machine -> execution
//! -> state store) through the public API:
//! 1. Spread widening and reverting opens then closes a position
//! 2. Out-of-order samples leave everything untouched
//! 3. Identical inputs give identical decisions, paper or not
//! 4. The position never flips legs without passing through NONE
//! 5. A restarted loop resumes from the position file
//! 6. A JSON-lines replay runs through the same pipeline
//!
//! All tests are deterministic (no real network calls).

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal_macros::dec;

use spreadbot::adapters::{PaperExecution, ReplayFeed};
use spreadbot::application::{CycleError, DecisionLoop, LoopSettings, RunSummary};
use spreadbot::domain::{
    JsonStateStore, Leg, MemoryStateStore, OrderAction, PositionState, PricePair, Signal,
};
use spreadbot::ports::mocks::{RecordingExecution, RecordingNotifier, ScriptedFeed};
use spreadbot::ports::{ExecutionPort, LogNotifier, PriceFeed, StateStore};
use spreadbot::strategy::StrategyConfig;

// ============================================================================
// Test Fixtures
// ============================================================================

const START: i64 = 1_700_000_000;

fn ts(i: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(START + i * 60, 0).unwrap()
}

/// Pair whose ratio spread equals `spread`
fn pair(i: i64, spread: f64) -> PricePair {
    PricePair::new(ts(i), spread * 100.0, 100.0)
}

fn pairs(spreads: &[f64]) -> Vec<PricePair> {
    spreads
        .iter()
        .enumerate()
        .map(|(i, s)| pair(i as i64, *s))
        .collect()
}

fn settings(window: usize, entry: f64) -> LoopSettings {
    LoopSettings {
        strategy: StrategyConfig::default()
            .with_window(window)
            .with_entry_threshold(entry),
        pair_label: "AAAUSDT/BBBUSDT".to_string(),
        trade_amount_quote: dec!(150),
        poll_interval: Duration::ZERO,
    }
}

fn build(
    settings: LoopSettings,
    feed: impl PriceFeed + 'static,
    execution: impl ExecutionPort + 'static,
    store: impl StateStore + 'static,
) -> DecisionLoop {
    DecisionLoop::new(
        settings,
        Box::new(feed),
        Box::new(execution),
        Box::new(store),
        Arc::new(LogNotifier),
    )
    .unwrap()
}

/// Two independent geometric random walks
fn random_walk(seed: u64, len: usize) -> Vec<PricePair> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price_a = 60_000.0_f64;
    let mut price_b = 3_000.0_f64;
    (0..len)
        .map(|i| {
            price_a *= 1.0 + rng.gen_range(-0.01..0.01);
            price_b *= 1.0 + rng.gen_range(-0.01..0.01);
            PricePair::new(ts(i as i64), price_a, price_b)
        })
        .collect()
}

/// (timestamp, signal, before, after) of every transition
fn decisions(summary: &RunSummary) -> Vec<(DateTime<Utc>, Signal, PositionState, PositionState)> {
    summary
        .trades
        .iter()
        .map(|t| (t.pair.timestamp, t.signal, t.state_before, t.state_after))
        .collect()
}

// ============================================================================
// Spread scenarios
// ============================================================================

#[tokio::test]
async fn test_widening_spread_opens_then_reversion_closes() {
    let execution = RecordingExecution::new();
    let store = MemoryStateStore::new();
    let notifier = RecordingNotifier::new();
    let mut lp = DecisionLoop::new(
        settings(3, 1.0),
        Box::new(ScriptedFeed::new(pairs(&[10.0, 10.0, 10.0, 16.0, 10.0]))),
        Box::new(execution.clone()),
        Box::new(store.clone()),
        Arc::new(notifier.clone()),
    )
    .unwrap();

    let summary = lp.run().await;

    assert_eq!(summary.cycles, 5);
    assert_eq!(summary.transitions, 2);
    assert_eq!(summary.final_state, PositionState::None);

    let open = &summary.trades[0];
    assert_eq!(open.signal, Signal::BuyB);
    assert_eq!(open.state_after, PositionState::HoldingB);
    assert_relative_eq!(open.z_score.unwrap(), 4.0 / 12.0_f64.sqrt(), epsilon = 1e-9);

    let close = &summary.trades[1];
    assert_eq!(close.signal, Signal::Close);
    assert_eq!(close.state_before, PositionState::HoldingB);
    assert_relative_eq!(close.z_score.unwrap(), -2.0 / 12.0_f64.sqrt(), epsilon = 1e-9);

    let calls = execution.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[0].leg, calls[0].action), (Leg::B, OrderAction::Acquire));
    assert_eq!((calls[1].leg, calls[1].action), (Leg::B, OrderAction::Release));

    let saved: Vec<_> = store.saves().iter().map(|r| r.state).collect();
    assert_eq!(saved, vec![PositionState::HoldingB, PositionState::None]);

    // Startup, two transitions, shutdown
    assert_eq!(notifier.notices().len(), 4);
}

#[tokio::test]
async fn test_flat_window_never_trades() {
    let execution = RecordingExecution::new();
    let mut lp = build(
        settings(3, 1.0),
        ScriptedFeed::new(pairs(&[10.0; 8])),
        execution.clone(),
        MemoryStateStore::new(),
    );

    let summary = lp.run().await;
    assert_eq!(summary.cycles, 8);
    assert_eq!(summary.transitions, 0);
    assert!(execution.calls().is_empty());
}

#[tokio::test]
async fn test_out_of_order_sample_changes_nothing() {
    let store = MemoryStateStore::new();
    let mut lp = build(
        settings(3, 1.0),
        ScriptedFeed::new(Vec::new()),
        RecordingExecution::new(),
        store.clone(),
    );

    for p in pairs(&[10.0, 10.0, 10.0, 16.0]) {
        lp.process_pair(p).await.unwrap();
    }
    assert_eq!(lp.state(), PositionState::HoldingB);
    let window_before = lp.engine().normalizer().spreads();

    // Earlier than the last accepted sample, and wide enough to matter
    let err = lp.process_pair(pair(2, 1.0)).await.unwrap_err();
    assert!(matches!(err, CycleError::OutOfOrder(_)));
    assert_eq!(lp.state(), PositionState::HoldingB);
    assert_eq!(lp.engine().normalizer().spreads(), window_before);
    assert_eq!(store.saves().len(), 1);

    // Same timestamp as the last one is rejected as well
    let err = lp.process_pair(pair(3, 10.0)).await.unwrap_err();
    assert!(matches!(err, CycleError::OutOfOrder(_)));
}

// ============================================================================
// Determinism and invariants
// ============================================================================

#[tokio::test]
async fn test_identical_inputs_identical_decisions() {
    let data = random_walk(7, 400);

    let mut first = build(
        settings(20, 1.5),
        ScriptedFeed::new(data.clone()),
        RecordingExecution::new(),
        MemoryStateStore::new(),
    );
    let mut second = build(
        settings(20, 1.5),
        ScriptedFeed::new(data),
        RecordingExecution::new(),
        MemoryStateStore::new(),
    );

    let a = first.run().await;
    let b = second.run().await;
    assert!(a.transitions > 0);
    assert_eq!(a.trades, b.trades);
    assert_eq!(a.final_state, b.final_state);
}

#[tokio::test]
async fn test_paper_mode_makes_the_same_decisions() {
    let data = random_walk(11, 400);

    let mut live_like = build(
        settings(20, 1.5),
        ScriptedFeed::new(data.clone()),
        RecordingExecution::new(),
        MemoryStateStore::new(),
    );
    let mut paper = build(
        settings(20, 1.5),
        ScriptedFeed::new(data),
        PaperExecution::new(),
        MemoryStateStore::new(),
    );

    let live_summary = live_like.run().await;
    let paper_summary = paper.run().await;
    assert_eq!(decisions(&live_summary), decisions(&paper_summary));
    assert_eq!(live_summary.final_state, paper_summary.final_state);
    assert!(paper_summary
        .trades
        .iter()
        .all(|t| t.executed.as_ref().map(|(_, r)| r.simulated).unwrap_or(false)));
}

#[tokio::test]
async fn test_never_switches_legs_directly() {
    for seed in [1_u64, 2, 3, 4, 5] {
        let mut lp = build(
            settings(10, 1.0),
            ScriptedFeed::new(random_walk(seed, 300)),
            RecordingExecution::new(),
            MemoryStateStore::new(),
        );
        let summary = lp.run().await;

        for trade in &summary.trades {
            assert!(
                trade.state_before.is_flat() || trade.state_after.is_flat(),
                "seed {}: {} -> {}",
                seed,
                trade.state_before,
                trade.state_after
            );
        }
        // Transitions alternate entry, close, entry, ...
        for (i, trade) in summary.trades.iter().enumerate() {
            assert_eq!(trade.signal.is_entry(), i % 2 == 0, "seed {}", seed);
        }
    }
}

// ============================================================================
// Persistence and replay
// ============================================================================

#[tokio::test]
async fn test_restart_resumes_open_position() {
    let dir = tempfile::tempdir().unwrap();
    let label = "AAAUSDT/BBBUSDT";

    let mut first = build(
        settings(3, 1.0),
        ScriptedFeed::new(pairs(&[10.0, 10.0, 10.0, 16.0])),
        RecordingExecution::new(),
        JsonStateStore::in_dir(dir.path(), label),
    );
    assert_eq!(first.run().await.final_state, PositionState::HoldingB);
    drop(first);

    // Fresh process: the window is empty again, the position is not
    let execution = RecordingExecution::new();
    let restart_feed = ScriptedFeed::new(vec![pair(10, 10.0), pair(11, 16.0), pair(12, 10.0)]);
    let mut second = build(
        settings(3, 1.0),
        restart_feed,
        execution.clone(),
        JsonStateStore::in_dir(dir.path(), label),
    );
    assert_eq!(second.state(), PositionState::HoldingB);
    assert_relative_eq!(
        second.record().entry_zscore.unwrap(),
        4.0 / 12.0_f64.sqrt(),
        epsilon = 1e-9
    );

    let summary = second.run().await;
    assert_eq!(summary.transitions, 1);
    assert_eq!(summary.trades[0].signal, Signal::Close);
    assert_eq!(execution.calls()[0].action, OrderAction::Release);

    let reloaded = JsonStateStore::in_dir(dir.path(), label).load_state().unwrap();
    assert_eq!(reloaded.state, PositionState::None);
}

#[tokio::test]
async fn test_position_file_for_other_pair_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = build(
        settings(3, 1.0),
        ScriptedFeed::new(pairs(&[10.0, 10.0, 10.0, 16.0])),
        RecordingExecution::new(),
        JsonStateStore::in_dir(dir.path(), "AAAUSDT/BBBUSDT"),
    );
    first.run().await;

    let result = DecisionLoop::new(
        settings(3, 1.0),
        Box::new(ScriptedFeed::new(Vec::new())),
        Box::new(RecordingExecution::new()),
        Box::new(JsonStateStore::in_dir(dir.path(), "CCCUSDT/DDDUSDT")),
        Arc::new(LogNotifier),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_replay_file_through_pipeline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# spread 10, 10, 10, 16, 10").unwrap();
    for p in pairs(&[10.0, 10.0, 10.0, 16.0, 10.0]) {
        writeln!(file, "{}", serde_json::to_string(&p).unwrap()).unwrap();
    }
    file.flush().unwrap();

    let feed = ReplayFeed::open(file.path()).await.unwrap();
    let mut lp = build(settings(3, 1.0), feed, PaperExecution::new(), MemoryStateStore::new());
    let summary = lp.run().await;

    assert_eq!(summary.cycles, 5);
    assert_eq!(summary.skipped, 0);
    let signals: Vec<_> = summary.trades.iter().map(|t| t.signal).collect();
    assert_eq!(signals, vec![Signal::BuyB, Signal::Close]);
    assert_eq!(summary.final_state, PositionState::None);
}
