use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::PipelineError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle.
///
/// The last element of a fetched series may still be forming
/// (`is_closed == false`); decisions are made on closed candles only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandleKey {
    pub symbol: String,
    pub interval: String,
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

// ---------------------------------------------------------------------------
// Series validation
// ---------------------------------------------------------------------------

/// Check the data contract on a fetched series: non-empty, finite non-negative
/// OHLCV fields, and strictly increasing open times.
///
/// The buffer refuses a series that violates the contract rather than letting
/// the advisor evaluate guessed or reordered data.
pub fn validate_series(candles: &[Candle]) -> Result<(), PipelineError> {
    if candles.is_empty() {
        return Err(PipelineError::InvalidInput(
            "empty candle series".to_string(),
        ));
    }

    let mut prev_open_time = i64::MIN;
    for (i, c) in candles.iter().enumerate() {
        for (name, v) in [
            ("open", c.open),
            ("high", c.high),
            ("low", c.low),
            ("close", c.close),
            ("volume", c.volume),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(PipelineError::InvalidInput(format!(
                    "candle {i}: {name} is not a non-negative finite number"
                )));
            }
        }
        if c.open_time <= prev_open_time {
            return Err(PipelineError::InvalidInput(format!(
                "candle {i}: open_time not strictly increasing"
            )));
        }
        prev_open_time = c.open_time;
    }

    Ok(())
}

/// The most recent closed candle of a series, if any.
pub fn last_closed(candles: &[Candle]) -> Option<&Candle> {
    candles.iter().rev().find(|c| c.is_closed)
}

// ---------------------------------------------------------------------------
// CandleBuffer — thread-safe store per (symbol, interval)
// ---------------------------------------------------------------------------

/// Thread-safe store holding the latest fetched window per `(symbol,
/// interval)` pair. Each poll replaces the window wholesale after contract
/// validation; the store never splices partial updates.
pub struct CandleBuffer {
    buffers: RwLock<HashMap<CandleKey, Vec<Candle>>>,
    max_candles: usize,
}

impl CandleBuffer {
    /// Create a buffer that retains at most `max_candles` per key.
    pub fn new(max_candles: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_candles,
        }
    }

    /// Validate and store a freshly fetched window, replacing any prior one.
    ///
    /// On a contract violation the previous window is left untouched so the
    /// next tick can still read consistent data.
    pub fn replace(&self, key: CandleKey, mut candles: Vec<Candle>) -> Result<(), PipelineError> {
        validate_series(&candles)?;

        if candles.len() > self.max_candles {
            let excess = candles.len() - self.max_candles;
            candles.drain(..excess);
            warn!(key = %key, excess, "fetched window exceeded buffer capacity — trimmed oldest");
        }

        self.buffers.write().insert(key, candles);
        Ok(())
    }

    /// All closed candles for a key (oldest-first order).
    pub fn closed_candles(&self, key: &CandleKey) -> Vec<Candle> {
        let map = self.buffers.read();
        match map.get(key) {
            Some(series) => series.iter().filter(|c| c.is_closed).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Close prices of all closed candles for a key (oldest-first order).
    pub fn closes(&self, key: &CandleKey) -> Vec<f64> {
        let map = self.buffers.read();
        match map.get(key) {
            Some(series) => series
                .iter()
                .filter(|c| c.is_closed)
                .map(|c| c.close)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Close price of the most recent closed candle, if any.
    pub fn last_close(&self, key: &CandleKey) -> Option<f64> {
        let map = self.buffers.read();
        map.get(key)
            .and_then(|series| last_closed(series).map(|c| c.close))
    }

    /// Total candles (including any forming candle) stored for a key.
    pub fn count(&self, key: &CandleKey) -> usize {
        let map = self.buffers.read();
        map.get(key).map_or(0, Vec::len)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
