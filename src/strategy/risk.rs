// =============================================================================
// Trade-Level Calculator — stop, target, and risk:reward
// =============================================================================
//
// Two interchangeable stop/target models sit behind one interface so the
// advisor stays agnostic to which is active:
//
//   FixedPercent — SL/TP at fixed fractions of the entry price.
//   EmaAnchored  — SL just beyond the fast EMA with a small buffer, TP from
//                  the minimum risk:reward multiple applied to that risk.
//
// All published levels are rounded to 2 decimal places. A degenerate
// `entry == sl` yields rr = 0 ("infinitely bad" reward — always fails the
// RR gate) rather than an error.
// =============================================================================

use serde::Serialize;

use crate::types::{Direction, PipelineError};

/// Computed entry/stop/target triple plus the resulting risk:reward ratio.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub rr: f64,
}

/// Stop/target policy. A policy knob, not a market-structure derivation;
/// swapping models must never require touching the advisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskModel {
    /// `sl = entry * (1 ∓ sl_pct)`, `tp = entry * (1 ± tp_pct)`.
    FixedPercent { sl_pct: f64, tp_pct: f64 },
    /// `sl = ema_fast * (1 ∓ buffer_pct)`, `tp = entry ± risk * rr_multiple`.
    EmaAnchored { buffer_pct: f64, rr_multiple: f64 },
}

impl RiskModel {
    /// Validate the model's parameters without computing levels.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match *self {
            Self::FixedPercent { sl_pct, tp_pct } => {
                if !sl_pct.is_finite() || sl_pct < 0.0 || !tp_pct.is_finite() || tp_pct < 0.0 {
                    return Err(PipelineError::ConfigurationError(
                        "fixed-percent fractions must be non-negative finite numbers".to_string(),
                    ));
                }
            }
            Self::EmaAnchored {
                buffer_pct,
                rr_multiple,
            } => {
                if !buffer_pct.is_finite() || buffer_pct < 0.0 {
                    return Err(PipelineError::ConfigurationError(
                        "stop-loss buffer must be a non-negative finite number".to_string(),
                    ));
                }
                if !rr_multiple.is_finite() || rr_multiple <= 0.0 {
                    return Err(PipelineError::ConfigurationError(
                        "risk:reward multiple must be > 0".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Compute stop, target, and risk:reward for an `entry` in the given
    /// `direction`. `ema_fast` anchors the stop under the EmaAnchored model
    /// and is ignored by FixedPercent.
    pub fn levels(
        &self,
        entry: f64,
        direction: Direction,
        ema_fast: f64,
    ) -> Result<TradeLevels, PipelineError> {
        self.validate()?;
        if !entry.is_finite() || entry <= 0.0 {
            return Err(PipelineError::InvalidInput(
                "entry must be a positive finite number".to_string(),
            ));
        }

        let (sl, tp) = match *self {
            Self::FixedPercent { sl_pct, tp_pct } => match direction {
                Direction::Long => (entry * (1.0 - sl_pct), entry * (1.0 + tp_pct)),
                Direction::Short => (entry * (1.0 + sl_pct), entry * (1.0 - tp_pct)),
            },
            Self::EmaAnchored {
                buffer_pct,
                rr_multiple,
            } => {
                if !ema_fast.is_finite() || ema_fast <= 0.0 {
                    return Err(PipelineError::MissingField("ema_fast"));
                }
                match direction {
                    Direction::Long => {
                        let sl = ema_fast * (1.0 - buffer_pct);
                        let risk = entry - sl;
                        (sl, entry + risk * rr_multiple)
                    }
                    Direction::Short => {
                        let sl = ema_fast * (1.0 + buffer_pct);
                        let risk = sl - entry;
                        (sl, entry - risk * rr_multiple)
                    }
                }
            }
        };

        let entry = round2(entry);
        let sl = round2(sl);
        let tp = round2(tp);

        Ok(TradeLevels {
            entry,
            sl,
            tp,
            rr: calculate_rr(entry, sl, tp),
        })
    }
}

/// Risk:reward ratio of a candidate trade, rounded to 2 decimal places.
/// Zero risk (`entry == sl`) is defined as rr = 0.
pub fn calculate_rr(entry: f64, sl: f64, tp: f64) -> f64 {
    let risk = (entry - sl).abs();
    if risk == 0.0 {
        return 0.0;
    }
    round2((tp - entry).abs() / risk)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> RiskModel {
        RiskModel::FixedPercent {
            sl_pct: 0.005,
            tp_pct: 0.01,
        }
    }

    #[test]
    fn fixed_percent_long_worked_example() {
        let levels = fixed().levels(50_000.0, Direction::Long, 0.0).unwrap();
        assert!((levels.sl - 49_750.0).abs() < 1e-9);
        assert!((levels.tp - 50_500.0).abs() < 1e-9);
        assert!((levels.rr - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_percent_short_mirrors_long() {
        let levels = fixed().levels(50_000.0, Direction::Short, 0.0).unwrap();
        assert!((levels.sl - 50_250.0).abs() < 1e-9);
        assert!((levels.tp - 49_500.0).abs() < 1e-9);
        assert!((levels.rr - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_risk_defines_rr_as_zero() {
        assert_eq!(calculate_rr(100.0, 100.0, 110.0), 0.0);

        // Misconfigured-to-zero percentage constants hit the same path.
        let degenerate = RiskModel::FixedPercent {
            sl_pct: 0.0,
            tp_pct: 0.01,
        };
        let levels = degenerate.levels(100.0, Direction::Long, 0.0).unwrap();
        assert_eq!(levels.rr, 0.0);
    }

    #[test]
    fn rr_rounds_to_two_decimals() {
        // reward 1.0, risk 3.0 => 0.3333.. => 0.33
        assert!((calculate_rr(100.0, 97.0, 101.0) - 0.33).abs() < 1e-9);
    }

    #[test]
    fn ema_anchored_long_levels() {
        let model = RiskModel::EmaAnchored {
            buffer_pct: 0.001,
            rr_multiple: 2.0,
        };
        let levels = model.levels(100.2, Direction::Long, 100.0).unwrap();
        // sl = 100 * 0.999 = 99.9, risk = 0.3, tp = 100.2 + 0.6
        assert!((levels.sl - 99.9).abs() < 1e-9);
        assert!((levels.tp - 100.8).abs() < 1e-9);
        assert!((levels.rr - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ema_anchored_short_levels() {
        let model = RiskModel::EmaAnchored {
            buffer_pct: 0.001,
            rr_multiple: 2.0,
        };
        let levels = model.levels(99.8, Direction::Short, 100.0).unwrap();
        // sl = 100 * 1.001 = 100.1, risk = 0.3, tp = 99.8 - 0.6
        assert!((levels.sl - 100.1).abs() < 1e-9);
        assert!((levels.tp - 99.2).abs() < 1e-9);
        assert!((levels.rr - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ema_anchored_requires_a_usable_ema() {
        let model = RiskModel::EmaAnchored {
            buffer_pct: 0.001,
            rr_multiple: 2.0,
        };
        assert!(matches!(
            model.levels(100.0, Direction::Long, f64::NAN),
            Err(PipelineError::MissingField("ema_fast"))
        ));
    }

    #[test]
    fn invalid_parameters_are_config_errors() {
        let negative_buffer = RiskModel::EmaAnchored {
            buffer_pct: -0.01,
            rr_multiple: 2.0,
        };
        assert!(matches!(
            negative_buffer.levels(100.0, Direction::Long, 100.0),
            Err(PipelineError::ConfigurationError(_))
        ));

        let negative_pct = RiskModel::FixedPercent {
            sl_pct: -0.005,
            tp_pct: 0.01,
        };
        assert!(negative_pct.validate().is_err());
    }

    #[test]
    fn non_positive_entry_is_invalid() {
        assert!(matches!(
            fixed().levels(0.0, Direction::Long, 0.0),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
