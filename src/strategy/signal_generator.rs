//! Signal Generator
//!
//! Pure mapping from (z-score, position) to a trading signal. Rules in
//! priority order:
//! 1. No z-score (warming up or degenerate window) -> HOLD
//! 2. Flat and z > +entry -> BUY_B (spread abnormally wide)
//! 3. Flat and z < -entry -> BUY_A (spread abnormally narrow)
//! 4. Holding and the z-score, signed in the entry direction, has dropped
//!    below the exit level -> CLOSE
//! 5. Otherwise HOLD

use crate::domain::{PositionRecord, Signal};
use crate::strategy::params::StrategyConfig;

pub fn generate_signal(
    zscore: Option<f64>,
    position: &PositionRecord,
    config: &StrategyConfig,
) -> Signal {
    let z = match zscore {
        Some(z) if z.is_finite() => z,
        _ => return Signal::Hold,
    };

    match position.entry_sign() {
        None => {
            if z > config.entry_threshold {
                Signal::BuyB
            } else if z < -config.entry_threshold {
                Signal::BuyA
            } else {
                Signal::Hold
            }
        }
        Some(sign) => {
            // Positive while the deviation that triggered entry persists
            let signed = z * sign;
            if signed < config.exit_level() {
                Signal::Close
            } else {
                Signal::Hold
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionState;

    fn holding(state: PositionState, entry_z: f64) -> PositionRecord {
        PositionRecord {
            state,
            entry_zscore: Some(entry_z),
            ..PositionRecord::default()
        }
    }

    #[test]
    fn test_undefined_zscore_holds() {
        let config = StrategyConfig::default();
        assert_eq!(generate_signal(None, &PositionRecord::flat(), &config), Signal::Hold);
        assert_eq!(
            generate_signal(None, &holding(PositionState::HoldingB, 2.5), &config),
            Signal::Hold
        );
        assert_eq!(
            generate_signal(Some(f64::NAN), &PositionRecord::flat(), &config),
            Signal::Hold
        );
    }

    #[test]
    fn test_entries_from_flat() {
        let config = StrategyConfig::default();
        let flat = PositionRecord::flat();
        assert_eq!(generate_signal(Some(2.1), &flat, &config), Signal::BuyB);
        assert_eq!(generate_signal(Some(-2.1), &flat, &config), Signal::BuyA);
        assert_eq!(generate_signal(Some(1.9), &flat, &config), Signal::Hold);
        assert_eq!(generate_signal(Some(-1.9), &flat, &config), Signal::Hold);
        // Threshold itself is not beyond it
        assert_eq!(generate_signal(Some(2.0), &flat, &config), Signal::Hold);
    }

    #[test]
    fn test_zero_cross_closes() {
        let config = StrategyConfig::default();
        let long_b = holding(PositionState::HoldingB, 2.4);
        assert_eq!(generate_signal(Some(0.5), &long_b, &config), Signal::Hold);
        assert_eq!(generate_signal(Some(-0.01), &long_b, &config), Signal::Close);

        let long_a = holding(PositionState::HoldingA, -2.4);
        assert_eq!(generate_signal(Some(-0.5), &long_a, &config), Signal::Hold);
        assert_eq!(generate_signal(Some(0.01), &long_a, &config), Signal::Close);
    }

    #[test]
    fn test_exit_is_relative_to_entry_direction() {
        let config = StrategyConfig::default();
        // Deviation grew further in the entry direction: keep holding
        let long_b = holding(PositionState::HoldingB, 2.4);
        assert_eq!(generate_signal(Some(3.5), &long_b, &config), Signal::Hold);

        let long_a = holding(PositionState::HoldingA, -2.4);
        assert_eq!(generate_signal(Some(-3.5), &long_a, &config), Signal::Hold);
    }

    #[test]
    fn test_hysteresis_delays_close() {
        let config = StrategyConfig::default().with_exit(0.0, 0.5);
        let long_b = holding(PositionState::HoldingB, 2.4);
        assert_eq!(generate_signal(Some(-0.3), &long_b, &config), Signal::Hold);
        assert_eq!(generate_signal(Some(-0.6), &long_b, &config), Signal::Close);
    }

    #[test]
    fn test_positive_exit_threshold_closes_early() {
        let config = StrategyConfig::default().with_exit(0.5, 0.0);
        let long_b = holding(PositionState::HoldingB, 2.4);
        assert_eq!(generate_signal(Some(0.4), &long_b, &config), Signal::Close);
        assert_eq!(generate_signal(Some(0.6), &long_b, &config), Signal::Hold);
    }

    #[test]
    fn test_holding_never_emits_entry() {
        let config = StrategyConfig::default();
        let long_b = holding(PositionState::HoldingB, 2.4);
        for z in [-10.0, -2.5, 0.0, 2.5, 10.0] {
            assert!(!generate_signal(Some(z), &long_b, &config).is_entry());
        }
    }
}
