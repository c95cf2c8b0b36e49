// =============================================================================
// Market Context Builders
// =============================================================================
//
// Reduces an indicator-augmented candle series into the compact snapshot the
// advisor decides on. The LTF context reads the final two bars (momentum
// needs a previous gap); the HTF reduction needs only the final bar because
// momentum is not consulted at the higher timeframe.
// =============================================================================

use serde::Serialize;

use crate::indicators::EmaPair;
use crate::market_data::Candle;
use crate::types::{Momentum, PipelineError, PricePosition, Trend};

/// Decision snapshot for the trading timeframe. Immutable once built;
/// recomputed whenever a new bar closes.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub trend: Trend,
    pub ema_gap: f64,
    pub momentum: Momentum,
    pub near_ema: bool,
    pub price_position: PricePosition,
    pub last_price: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
}

/// Reduced snapshot for the higher timeframe: just the trend plus the EMA
/// values it was derived from.
#[derive(Debug, Clone, Serialize)]
pub struct HtfContext {
    pub htf_trend: Trend,
    pub ema_fast: f64,
    pub ema_slow: f64,
}

/// Strict trend rule: bullish iff `fast > slow`; an exactly equal pair is
/// bearish.
fn trend_of(ema_fast: f64, ema_slow: f64) -> Trend {
    if ema_fast > ema_slow {
        Trend::Bullish
    } else {
        Trend::Bearish
    }
}

fn require_finite(value: f64, name: &'static str) -> Result<f64, PipelineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PipelineError::MissingField(name))
    }
}

/// Build the trading-timeframe context from the final two bars of `candles`
/// and their EMA series.
///
/// `near_threshold` is the pullback proximity bound as a fraction of the
/// close (default 0.002 = 0.2%).
///
/// # Errors
/// - `InsufficientData` with fewer than 2 bars.
/// - `InvalidInput` when the EMA series length does not match the candles, or
///   the last close is non-positive.
/// - `MissingField` when a required EMA value is non-finite.
pub fn build_context(
    candles: &[Candle],
    emas: &EmaPair,
    near_threshold: f64,
) -> Result<Context, PipelineError> {
    if candles.len() < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "context needs >= 2 bars, got {}",
            candles.len()
        )));
    }
    if emas.fast.len() != candles.len() || emas.slow.len() != candles.len() {
        return Err(PipelineError::InvalidInput(
            "EMA series length does not match candle series".to_string(),
        ));
    }

    let last = candles.len() - 1;
    let prev = last - 1;

    let ema_fast = require_finite(emas.fast[last], "ema_fast")?;
    let ema_slow = require_finite(emas.slow[last], "ema_slow")?;
    let prev_fast = require_finite(emas.fast[prev], "ema_fast")?;
    let prev_slow = require_finite(emas.slow[prev], "ema_slow")?;

    let last_price = candles[last].close;
    if !last_price.is_finite() || last_price <= 0.0 {
        return Err(PipelineError::InvalidInput(
            "last close must be a positive finite number".to_string(),
        ));
    }

    let ema_gap = (ema_fast - ema_slow).abs();
    let prev_gap = (prev_fast - prev_slow).abs();

    // Gap growing = strengthening; shrinking or unchanged = weakening.
    let momentum = if ema_gap > prev_gap {
        Momentum::Strengthening
    } else {
        Momentum::Weakening
    };

    let near_ema = (last_price - ema_fast).abs() / last_price < near_threshold;

    let price_position = if last_price > ema_fast && last_price > ema_slow {
        PricePosition::AboveBoth
    } else if last_price < ema_fast && last_price < ema_slow {
        PricePosition::BelowBoth
    } else {
        PricePosition::Mixed
    };

    Ok(Context {
        trend: trend_of(ema_fast, ema_slow),
        ema_gap,
        momentum,
        near_ema,
        price_position,
        last_price,
        ema_fast,
        ema_slow,
    })
}

/// Build the higher-timeframe context from the final bar only.
pub fn build_htf_context(candles: &[Candle], emas: &EmaPair) -> Result<HtfContext, PipelineError> {
    if candles.is_empty() {
        return Err(PipelineError::InsufficientData(
            "HTF context needs >= 1 bar".to_string(),
        ));
    }
    if emas.fast.len() != candles.len() || emas.slow.len() != candles.len() {
        return Err(PipelineError::InvalidInput(
            "EMA series length does not match candle series".to_string(),
        ));
    }

    let last = candles.len() - 1;
    let ema_fast = require_finite(emas.fast[last], "ema_fast")?;
    let ema_slow = require_finite(emas.slow[last], "ema_slow")?;

    Ok(HtfContext {
        htf_trend: trend_of(ema_fast, ema_slow),
        ema_fast,
        ema_slow,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::add_ema;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: i as i64 * 180_000,
                close_time: i as i64 * 180_000 + 179_999,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                is_closed: true,
            })
            .collect()
    }

    fn context_for(closes: &[f64]) -> Context {
        let candles = candles_from_closes(closes);
        let emas = add_ema(closes, 21, 34).unwrap();
        build_context(&candles, &emas, 0.002).unwrap()
    }

    #[test]
    fn fewer_than_two_bars_is_insufficient() {
        let candles = candles_from_closes(&[100.0]);
        let emas = add_ema(&[100.0], 21, 34).unwrap();
        assert!(matches!(
            build_context(&candles, &emas, 0.002),
            Err(PipelineError::InsufficientData(_))
        ));
    }

    #[test]
    fn mismatched_ema_length_is_invalid() {
        let candles = candles_from_closes(&[100.0, 101.0, 102.0]);
        let emas = add_ema(&[100.0, 101.0], 21, 34).unwrap();
        assert!(matches!(
            build_context(&candles, &emas, 0.002),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn rising_series_is_bullish_above_both() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let ctx = context_for(&closes);
        assert_eq!(ctx.trend, Trend::Bullish);
        assert_eq!(ctx.price_position, PricePosition::AboveBoth);
        assert!(ctx.ema_gap > 0.0);
    }

    #[test]
    fn falling_series_is_bearish_below_both() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let ctx = context_for(&closes);
        assert_eq!(ctx.trend, Trend::Bearish);
        assert_eq!(ctx.price_position, PricePosition::BelowBoth);
    }

    #[test]
    fn equal_emas_resolve_to_bearish() {
        // Constant closes keep both EMAs pinned at the seed value.
        let ctx = context_for(&vec![100.0; 40]);
        assert_eq!(ctx.trend, Trend::Bearish);
        assert!(ctx.ema_gap.abs() < 1e-12);
        // Unchanged gap counts as weakening.
        assert_eq!(ctx.momentum, Momentum::Weakening);
    }

    #[test]
    fn widening_gap_is_strengthening() {
        let mut closes = vec![100.0; 30];
        closes.extend([101.0, 102.0, 103.0]);
        let ctx = context_for(&closes);
        assert_eq!(ctx.momentum, Momentum::Strengthening);
    }

    #[test]
    fn near_ema_respects_the_threshold() {
        // Flat series: close == ema_fast, distance 0 < any positive threshold.
        let ctx = context_for(&vec![100.0; 40]);
        assert!(ctx.near_ema);

        // A sharp final spike pulls the close far from the fast EMA.
        let mut closes = vec![100.0; 40];
        closes.push(110.0);
        let ctx = context_for(&closes);
        assert!(!ctx.near_ema);
    }

    #[test]
    fn htf_context_needs_only_one_bar() {
        let candles = candles_from_closes(&[100.0]);
        let emas = add_ema(&[100.0], 21, 34).unwrap();
        let htf = build_htf_context(&candles, &emas).unwrap();
        assert_eq!(htf.htf_trend, Trend::Bearish); // equal EMAs => bearish
    }

    #[test]
    fn htf_trend_matches_ltf_rule() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        let emas = add_ema(&closes, 21, 34).unwrap();
        let htf = build_htf_context(&candles, &emas).unwrap();
        assert_eq!(htf.htf_trend, Trend::Bullish);
        assert!(htf.ema_fast > htf.ema_slow);
    }
}
