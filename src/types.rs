// =============================================================================
// Shared types used across the Pulse advisor
// =============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of the EMA stack on a single timeframe.
///
/// The comparison is strict (`ema_fast > ema_slow`); an exactly equal pair
/// resolves to `Bearish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

/// Whether the EMA gap grew or shrank between the previous and last bar.
/// An unchanged gap counts as `Weakening`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Strengthening,
    Weakening,
}

impl std::fmt::Display for Momentum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strengthening => write!(f, "strengthening"),
            Self::Weakening => write!(f, "weakening"),
        }
    }
}

/// Where the last close sits relative to the two EMAs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePosition {
    AboveBoth,
    BelowBoth,
    Mixed,
}

/// Trade direction for level computation and journalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Which stop/target model the advisor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskModelKind {
    FixedPercent,
    EmaAnchored,
}

impl Default for RiskModelKind {
    fn default() -> Self {
        Self::FixedPercent
    }
}

impl std::fmt::Display for RiskModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedPercent => write!(f, "fixed_percent"),
            Self::EmaAnchored => write!(f, "ema_anchored"),
        }
    }
}

// =============================================================================
// Error taxonomy
// =============================================================================

/// Failures the signal pipeline can surface for a single tick.
///
/// All variants are tick-scoped: a failed tick mutates no session state and
/// writes no journal line. Ordinary no-trade conditions are *not* errors —
/// the advisor returns a structured WAIT / NO TRADE result for those.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty or malformed candle/close series.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fewer bars than the computation needs. Surfaced as a no-op tick.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A required context field is absent or non-finite.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Invalid tunable (span of 0, negative buffer, non-positive RR floor).
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_labels() {
        assert_eq!(Trend::Bullish.to_string(), "bullish");
        assert_eq!(Momentum::Weakening.to_string(), "weakening");
        assert_eq!(Direction::Long.to_string(), "LONG");
        assert_eq!(RiskModelKind::EmaAnchored.to_string(), "ema_anchored");
    }

    #[test]
    fn risk_model_kind_round_trips_through_serde() {
        let json = serde_json::to_string(&RiskModelKind::FixedPercent).unwrap();
        assert_eq!(json, "\"fixed_percent\"");
        let back: RiskModelKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RiskModelKind::FixedPercent);
    }

    #[test]
    fn error_messages_name_their_kind() {
        let e = PipelineError::InsufficientData("need 2 bars".into());
        assert!(e.to_string().contains("insufficient data"));
        let e = PipelineError::ConfigurationError("span must be > 0".into());
        assert!(e.to_string().contains("configuration error"));
    }
}
