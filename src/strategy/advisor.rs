// =============================================================================
// Advisor — the entry gate
// =============================================================================
//
// Pure decision function over (Context, HtfContext, AdvisorConfig). Gates run
// in a fixed order and short-circuit; later gates never override an earlier
// rejection:
//
//   1. HTF alignment — a misaligned LTF is a pullback against the dominant
//      trend, never a reversal signal. Absolute veto.
//   2. Chop filter — EMA gap below the floor is non-trending noise; above
//      the ceiling the trend is extended and fresh entries have poor reward.
//   3. Pullback gate — entries only on retracement into the EMA zone,
//      never on a breakout.
//   4. Price-position confirmation (optional) — the pullback must have
//      resumed in trend direction.
//   5. Trade construction via the configured risk model.
//   6. RR gate — inclusive (`rr >= min_rr` accepts). Final veto.
//
// Every rejection is a structured result with notes; the advisor only fails
// hard on malformed context fields or bad configuration.
// =============================================================================

use serde::Serialize;

use crate::strategy::context::{Context, HtfContext};
use crate::strategy::risk::RiskModel;
use crate::types::{Direction, Momentum, PipelineError, PricePosition, Trend};

// =============================================================================
// Result types
// =============================================================================

/// Discrete action the advisor can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeAction {
    #[serde(rename = "TAKE LONG")]
    TakeLong,
    #[serde(rename = "TAKE SHORT")]
    TakeShort,
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "NO TRADE")]
    NoTrade,
    #[serde(rename = "SIGNAL EXPIRED")]
    Expired,
}

impl TradeAction {
    pub fn is_take(&self) -> bool {
        matches!(self, Self::TakeLong | Self::TakeShort)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::TakeLong => Some(Direction::Long),
            Self::TakeShort => Some(Direction::Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TakeLong => write!(f, "TAKE LONG"),
            Self::TakeShort => write!(f, "TAKE SHORT"),
            Self::Wait => write!(f, "WAIT"),
            Self::NoTrade => write!(f, "NO TRADE"),
            Self::Expired => write!(f, "SIGNAL EXPIRED"),
        }
    }
}

/// The advisor's verdict for one evaluation. Trade levels are present only
/// on TAKE actions; `notes` record every gate the decision passed or failed.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisorResult {
    /// Unique identifier for this decision (UUID v4).
    pub id: String,
    pub action: TradeAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr: Option<f64>,
    pub notes: Vec<String>,
    /// ISO 8601 timestamp of when this decision was created.
    pub created_at: String,
}

impl AdvisorResult {
    fn rejection(action: TradeAction, notes: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            entry: None,
            sl: None,
            tp: None,
            rr: None,
            notes,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Fixed terminal result the lifecycle manager substitutes once a frozen
    /// signal outlives its validity window.
    pub fn expired() -> Self {
        Self::rejection(
            TradeAction::Expired,
            vec!["Signal validity window elapsed — wait for a fresh candle close".to_string()],
        )
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Tunables consumed by the entry gate.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Minimum acceptable risk:reward; the RR gate is inclusive.
    pub min_rr: f64,
    /// Chop floor on the absolute EMA gap (price units). `None` disables.
    pub min_ema_gap: Option<f64>,
    /// Late-trend ceiling on the absolute EMA gap. `None` disables.
    pub max_ema_gap: Option<f64>,
    /// Require price above/below both EMAs before accepting (structure
    /// confirmation used by the EMA-anchored lineage).
    pub confirm_price_position: bool,
    pub risk_model: RiskModel,
}

impl AdvisorConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.min_rr.is_finite() || self.min_rr <= 0.0 {
            return Err(PipelineError::ConfigurationError(
                "min_rr must be > 0".to_string(),
            ));
        }
        for (name, bound) in [
            ("min_ema_gap", self.min_ema_gap),
            ("max_ema_gap", self.max_ema_gap),
        ] {
            if let Some(v) = bound {
                if !v.is_finite() || v < 0.0 {
                    return Err(PipelineError::ConfigurationError(format!(
                        "{name} must be a non-negative finite number"
                    )));
                }
            }
        }
        self.risk_model.validate()
    }
}

// =============================================================================
// Decision procedure
// =============================================================================

/// Evaluate the entry gates and produce a verdict.
///
/// # Errors
/// `MissingField` for non-finite context fields, `ConfigurationError` for bad
/// tunables. Ordinary no-trade conditions return a structured result.
pub fn advise(
    ctx: &Context,
    htf: &HtfContext,
    cfg: &AdvisorConfig,
) -> Result<AdvisorResult, PipelineError> {
    cfg.validate()?;
    if !ctx.last_price.is_finite() || ctx.last_price <= 0.0 {
        return Err(PipelineError::MissingField("last_price"));
    }
    if !ctx.ema_fast.is_finite() {
        return Err(PipelineError::MissingField("ema_fast"));
    }
    if !ctx.ema_gap.is_finite() {
        return Err(PipelineError::MissingField("ema_gap"));
    }

    let mut notes = Vec::new();

    match ctx.trend {
        Trend::Bullish => {
            notes.push("Higher probability trend is BULLISH (EMA fast > EMA slow)".to_string())
        }
        Trend::Bearish => {
            notes.push("Higher probability trend is BEARISH (EMA fast <= EMA slow)".to_string())
        }
    }

    // ── 1. HTF alignment gate ────────────────────────────────────────────
    if ctx.trend != htf.htf_trend {
        notes.push(format!(
            "HTF trend is {} while LTF trend is {} — higher timeframe takes precedence",
            htf.htf_trend, ctx.trend
        ));
        notes.push("LTF move reads as a pullback against the dominant trend, not a reversal".to_string());
        return Ok(AdvisorResult::rejection(TradeAction::NoTrade, notes));
    }
    notes.push(format!("LTF aligned with HTF ({})", htf.htf_trend));

    // ── 2. Chop filter ───────────────────────────────────────────────────
    if let Some(min_gap) = cfg.min_ema_gap {
        if ctx.ema_gap < min_gap {
            notes.push(format!(
                "EMA gap {:.2} below chop floor {:.2} — market is not trending",
                ctx.ema_gap, min_gap
            ));
            return Ok(AdvisorResult::rejection(TradeAction::NoTrade, notes));
        }
    }
    if let Some(max_gap) = cfg.max_ema_gap {
        if ctx.ema_gap > max_gap {
            notes.push(format!(
                "EMA gap {:.2} above ceiling {:.2} — trend extended, entry too late",
                ctx.ema_gap, max_gap
            ));
            return Ok(AdvisorResult::rejection(TradeAction::Wait, notes));
        }
    }

    // ── 3. Pullback gate ─────────────────────────────────────────────────
    if !ctx.near_ema {
        notes.push("Price is not near the EMA pullback zone".to_string());
        notes.push("Waiting for price to retrace closer to the fast EMA".to_string());
        return Ok(AdvisorResult::rejection(TradeAction::Wait, notes));
    }
    notes.push("Price is near the EMA pullback zone".to_string());

    match ctx.momentum {
        Momentum::Weakening => {
            notes.push("Momentum is weakening — pullback likely ending".to_string())
        }
        Momentum::Strengthening => {
            notes.push("Momentum still strong — pullback may be shallow".to_string())
        }
    }

    // ── 4. Price-position confirmation ───────────────────────────────────
    if cfg.confirm_price_position {
        let confirmed = matches!(
            (ctx.trend, ctx.price_position),
            (Trend::Bullish, PricePosition::AboveBoth)
                | (Trend::Bearish, PricePosition::BelowBoth)
        );
        if !confirmed {
            notes.push(
                "Pullback not yet resumed in trend direction (price not beyond both EMAs)"
                    .to_string(),
            );
            return Ok(AdvisorResult::rejection(TradeAction::Wait, notes));
        }
        notes.push("Price resumed beyond both EMAs in trend direction".to_string());
    }

    // ── 5. Trade construction ────────────────────────────────────────────
    let direction = match ctx.trend {
        Trend::Bullish => Direction::Long,
        Trend::Bearish => Direction::Short,
    };
    let levels = cfg
        .risk_model
        .levels(ctx.last_price, direction, ctx.ema_fast)?;

    // ── 6. Risk:reward gate (inclusive) ──────────────────────────────────
    if levels.rr < cfg.min_rr {
        notes.push(format!(
            "RR {:.2} below minimum {:.2} — reward does not justify the risk",
            levels.rr, cfg.min_rr
        ));
        return Ok(AdvisorResult::rejection(TradeAction::Wait, notes));
    }

    // ── 7. Acceptance ────────────────────────────────────────────────────
    notes.push(format!(
        "SL {:.2} / TP {:.2} via {} model, RR {:.2} >= {:.2}",
        levels.sl,
        levels.tp,
        match cfg.risk_model {
            RiskModel::FixedPercent { .. } => "fixed-percent",
            RiskModel::EmaAnchored { .. } => "EMA-anchored",
        },
        levels.rr,
        cfg.min_rr
    ));
    notes.push("Trend, alignment and pullback conditions satisfied".to_string());

    let action = match direction {
        Direction::Long => TradeAction::TakeLong,
        Direction::Short => TradeAction::TakeShort,
    };

    Ok(AdvisorResult {
        id: uuid::Uuid::new_v4().to_string(),
        action,
        entry: Some(levels.entry),
        sl: Some(levels.sl),
        tp: Some(levels.tp),
        rr: Some(levels.rr),
        notes,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(trend: Trend) -> Context {
        Context {
            trend,
            ema_gap: 50.0,
            momentum: Momentum::Weakening,
            near_ema: true,
            price_position: match trend {
                Trend::Bullish => PricePosition::AboveBoth,
                Trend::Bearish => PricePosition::BelowBoth,
            },
            last_price: 50_000.0,
            ema_fast: 49_980.0,
            ema_slow: 49_930.0,
        }
    }

    fn htf(trend: Trend) -> HtfContext {
        HtfContext {
            htf_trend: trend,
            ema_fast: 50_000.0,
            ema_slow: 49_900.0,
        }
    }

    fn cfg() -> AdvisorConfig {
        AdvisorConfig {
            min_rr: 2.0,
            min_ema_gap: Some(25.0),
            max_ema_gap: Some(200.0),
            confirm_price_position: false,
            risk_model: RiskModel::FixedPercent {
                sl_pct: 0.005,
                tp_pct: 0.01,
            },
        }
    }

    #[test]
    fn aligned_bullish_pullback_is_accepted() {
        let result = advise(&ctx(Trend::Bullish), &htf(Trend::Bullish), &cfg()).unwrap();
        assert_eq!(result.action, TradeAction::TakeLong);
        assert_eq!(result.entry, Some(50_000.0));
        assert_eq!(result.sl, Some(49_750.0));
        assert_eq!(result.tp, Some(50_500.0));
        assert_eq!(result.rr, Some(2.0));
        assert!(!result.notes.is_empty());
    }

    #[test]
    fn aligned_bearish_pullback_takes_short() {
        let result = advise(&ctx(Trend::Bearish), &htf(Trend::Bearish), &cfg()).unwrap();
        assert_eq!(result.action, TradeAction::TakeShort);
        assert_eq!(result.action.direction(), Some(Direction::Short));
    }

    #[test]
    fn htf_veto_is_absolute() {
        // The veto must hold for every combination of the other fields.
        for momentum in [Momentum::Strengthening, Momentum::Weakening] {
            for near_ema in [true, false] {
                for position in [
                    PricePosition::AboveBoth,
                    PricePosition::BelowBoth,
                    PricePosition::Mixed,
                ] {
                    for gap in [1.0, 50.0, 500.0] {
                        let mut c = ctx(Trend::Bullish);
                        c.momentum = momentum;
                        c.near_ema = near_ema;
                        c.price_position = position;
                        c.ema_gap = gap;
                        let result = advise(&c, &htf(Trend::Bearish), &cfg()).unwrap();
                        assert_eq!(result.action, TradeAction::NoTrade);
                        assert!(result.entry.is_none());
                    }
                }
            }
        }
    }

    #[test]
    fn small_gap_rejects_as_chop() {
        let mut c = ctx(Trend::Bullish);
        c.ema_gap = 10.0;
        let result = advise(&c, &htf(Trend::Bullish), &cfg()).unwrap();
        assert_eq!(result.action, TradeAction::NoTrade);
        assert!(result.notes.iter().any(|n| n.contains("chop floor")));
    }

    #[test]
    fn large_gap_waits_as_late_trend() {
        let mut c = ctx(Trend::Bullish);
        c.ema_gap = 500.0;
        let result = advise(&c, &htf(Trend::Bullish), &cfg()).unwrap();
        assert_eq!(result.action, TradeAction::Wait);
        assert!(result.notes.iter().any(|n| n.contains("extended")));
    }

    #[test]
    fn gap_bounds_disabled_when_unconfigured() {
        let mut config = cfg();
        config.min_ema_gap = None;
        config.max_ema_gap = None;
        let mut c = ctx(Trend::Bullish);
        c.ema_gap = 1.0;
        let result = advise(&c, &htf(Trend::Bullish), &config).unwrap();
        assert!(result.action.is_take());
    }

    #[test]
    fn far_from_ema_waits_for_pullback() {
        let mut c = ctx(Trend::Bullish);
        c.near_ema = false;
        let result = advise(&c, &htf(Trend::Bullish), &cfg()).unwrap();
        assert_eq!(result.action, TradeAction::Wait);
        assert!(result.notes.iter().any(|n| n.contains("pullback zone")));
    }

    #[test]
    fn rr_gate_is_inclusive_at_the_threshold() {
        // Fixed-percent 0.5%/1% yields rr exactly 2.0; min_rr 2.0 must accept.
        let result = advise(&ctx(Trend::Bullish), &htf(Trend::Bullish), &cfg()).unwrap();
        assert_eq!(result.rr, Some(2.0));
        assert!(result.action.is_take());
    }

    #[test]
    fn rr_below_minimum_waits_with_a_note() {
        let mut config = cfg();
        config.min_rr = 2.5;
        let result = advise(&ctx(Trend::Bullish), &htf(Trend::Bullish), &config).unwrap();
        assert_eq!(result.action, TradeAction::Wait);
        assert!(result.rr.is_none());
        assert!(result.notes.iter().any(|n| n.contains("below minimum")));
    }

    #[test]
    fn price_position_confirmation_blocks_mixed() {
        let mut config = cfg();
        config.confirm_price_position = true;
        let mut c = ctx(Trend::Bullish);
        c.price_position = PricePosition::Mixed;
        let result = advise(&c, &htf(Trend::Bullish), &config).unwrap();
        assert_eq!(result.action, TradeAction::Wait);

        c.price_position = PricePosition::AboveBoth;
        let result = advise(&c, &htf(Trend::Bullish), &config).unwrap();
        assert!(result.action.is_take());
    }

    #[test]
    fn ema_anchored_model_flows_through_the_same_gates() {
        let mut config = cfg();
        config.risk_model = RiskModel::EmaAnchored {
            buffer_pct: 0.001,
            rr_multiple: 2.0,
        };
        config.min_ema_gap = None;

        let mut c = ctx(Trend::Bullish);
        c.last_price = 100.2;
        c.ema_fast = 100.0;
        c.ema_slow = 99.9;
        c.ema_gap = 0.1;
        let result = advise(&c, &htf(Trend::Bullish), &config).unwrap();
        assert_eq!(result.action, TradeAction::TakeLong);
        assert_eq!(result.sl, Some(99.9));
        assert_eq!(result.tp, Some(100.8));
    }

    #[test]
    fn bad_min_rr_is_a_config_error() {
        let mut config = cfg();
        config.min_rr = 0.0;
        assert!(matches!(
            advise(&ctx(Trend::Bullish), &htf(Trend::Bullish), &config),
            Err(PipelineError::ConfigurationError(_))
        ));
    }

    #[test]
    fn non_finite_context_field_is_a_missing_field() {
        let mut c = ctx(Trend::Bullish);
        c.ema_fast = f64::NAN;
        assert!(matches!(
            advise(&c, &htf(Trend::Bullish), &cfg()),
            Err(PipelineError::MissingField("ema_fast"))
        ));
    }

    #[test]
    fn action_serialises_to_wire_labels() {
        assert_eq!(
            serde_json::to_string(&TradeAction::TakeLong).unwrap(),
            "\"TAKE LONG\""
        );
        assert_eq!(
            serde_json::to_string(&TradeAction::Expired).unwrap(),
            "\"SIGNAL EXPIRED\""
        );
        // Display mirrors the serialised labels.
        assert_eq!(TradeAction::NoTrade.to_string(), "NO TRADE");
    }
}
