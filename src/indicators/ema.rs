// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average.
//
// Formula (unadjusted recursive form):
//   alpha  = 2 / (span + 1)
//   ema[0] = close[0]
//   ema[i] = close[i] * alpha + ema[i-1] * (1 - alpha)
//
// Seeding with the first close keeps the series defined for windows shorter
// than the span; the series still converges to the same values as the
// span-length history grows.
// =============================================================================

use crate::types::PipelineError;

/// The two parallel EMA series the advisor consumes. Both vectors have the
/// same length as the close series they were derived from.
#[derive(Debug, Clone)]
pub struct EmaPair {
    pub fast: Vec<f64>,
    pub slow: Vec<f64>,
}

impl EmaPair {
    /// Last fast/slow pair, if any values exist.
    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.fast.last()?, *self.slow.last()?))
    }
}

/// Compute the fast and slow EMA series for `closes`.
///
/// Fast < slow is the convention but is not enforced; the advisor's gates
/// behave symmetrically either way.
///
/// # Errors
/// - `InvalidInput` when `closes` is empty or contains a non-finite value.
/// - `ConfigurationError` when either span is zero.
pub fn add_ema(closes: &[f64], fast_span: usize, slow_span: usize) -> Result<EmaPair, PipelineError> {
    Ok(EmaPair {
        fast: ema_series(closes, fast_span)?,
        slow: ema_series(closes, slow_span)?,
    })
}

/// Compute a single EMA series over `closes` with the given `span`.
///
/// Output length equals input length; `out[0] == closes[0]`. An EMA value for
/// a bar never changes once computed, given a fixed leading history.
pub fn ema_series(closes: &[f64], span: usize) -> Result<Vec<f64>, PipelineError> {
    if span == 0 {
        return Err(PipelineError::ConfigurationError(
            "EMA span must be > 0".to_string(),
        ));
    }
    if closes.is_empty() {
        return Err(PipelineError::InvalidInput(
            "empty close series".to_string(),
        ));
    }

    let alpha = 2.0 / (span as f64 + 1.0);

    let mut result = Vec::with_capacity(closes.len());
    let mut prev = closes[0];
    if !prev.is_finite() {
        return Err(PipelineError::InvalidInput(
            "non-finite close at index 0".to_string(),
        ));
    }
    result.push(prev);

    for (i, &close) in closes.iter().enumerate().skip(1) {
        if !close.is_finite() {
            return Err(PipelineError::InvalidInput(format!(
                "non-finite close at index {i}"
            )));
        }
        let ema = close * alpha + prev * (1.0 - alpha);
        result.push(ema);
        prev = ema;
    }

    Ok(result)
}
