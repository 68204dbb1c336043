//! Strategy Layer - Pairs mean reversion on a spread z-score
//!
//! - `spread`: fixed spread definition (ratio or log ratio)
//! - `zscore_gate`: rolling window normalizer
//! - `signal_generator`: entry/exit rules
//! - `engine`: the three chained for one observation

pub mod params;
pub mod spread;
pub mod zscore_gate;
pub mod signal_generator;
pub mod engine;

pub use params::{StrategyConfig, StrategyConfigError};
pub use spread::{SpreadCalculator, SpreadKind};
pub use zscore_gate::{NormalizerError, RollingNormalizer, ZScoreOutcome, ZScoreSample, MIN_STD_DEV};
pub use signal_generator::generate_signal;
pub use engine::{EngineError, Evaluation, PairsEngine};
