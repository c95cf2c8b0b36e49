// =============================================================================
// Central Application State — Pulse advisor session
// =============================================================================
//
// Single source of truth for one trading session (one symbol/timeframe pair).
// The polling loop writes into it; the REST API reads snapshots out of it.
// A second session would own its own `AppState` — nothing here is process
// global.
//
// Thread safety: atomic counter for version tracking, parking_lot::RwLock for
// mutable fields. The pipeline itself is single-writer (one poll loop), the
// locks cover concurrent API reads.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::journal::TradeJournal;
use crate::market_data::CandleBuffer;
use crate::runtime_config::RuntimeConfig;
use crate::strategy::advisor::AdvisorResult;
use crate::strategy::context::{Context, HtfContext};
use crate::strategy::lifecycle::{SignalLifecycle, SignalStateSnapshot};

/// Central session state shared across async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every meaningful
    /// mutation so pollers of the snapshot endpoint can detect changes.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub candle_buffer: Arc<CandleBuffer>,
    pub lifecycle: RwLock<SignalLifecycle>,
    pub journal: Arc<TradeJournal>,

    // ── Last completed tick outputs (for the presentation API) ──────────
    pub last_context: RwLock<Option<Context>>,
    pub last_htf_context: RwLock<Option<HtfContext>>,
    pub last_signal: RwLock<Option<AdvisorResult>>,
    pub last_tick_at: RwLock<Option<String>>,
    pub last_tick_error: RwLock<Option<String>>,

    /// Id of the last journalled signal, so a frozen signal returned on
    /// every refresh tick is written exactly once.
    pub last_journaled_id: RwLock<Option<String>>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        let lifecycle = SignalLifecycle::new(config.validity_window_candles);
        let journal = Arc::new(TradeJournal::new(config.journal_path.clone()));
        let candle_capacity = config.candle_limit.max(2);

        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            candle_buffer: Arc::new(CandleBuffer::new(candle_capacity)),
            lifecycle: RwLock::new(lifecycle),
            journal,
            last_context: RwLock::new(None),
            last_htf_context: RwLock::new(None),
            last_signal: RwLock::new(None),
            last_tick_at: RwLock::new(None),
            last_tick_error: RwLock::new(None),
            last_journaled_id: RwLock::new(None),
            start_time: std::time::Instant::now(),
        }
    }

    /// Atomically increment the state version.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Record a failed tick. The pipeline guarantees a failed tick mutated
    /// nothing else, so only the error surface changes.
    pub fn record_tick_error(&self, message: String) {
        *self.last_tick_error.write() = Some(message);
        self.increment_version();
    }

    /// Build a complete, serialisable snapshot for the dashboard API.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let config = self.runtime_config.read();

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            symbol: config.symbol.clone(),
            ltf_interval: config.ltf_interval.clone(),
            htf_interval: config.htf_interval.clone(),
            context: self.last_context.read().clone(),
            htf_context: self.last_htf_context.read().clone(),
            signal: self.last_signal.read().clone(),
            signal_state: self.lifecycle.read().snapshot(),
            config: ConfigSummary {
                ema_fast: config.ema_fast,
                ema_slow: config.ema_slow,
                htf_ema_fast: config.htf_ema_fast,
                htf_ema_slow: config.htf_ema_slow,
                near_ema_threshold: config.near_ema_threshold,
                min_ema_gap: config.min_ema_gap,
                max_ema_gap: config.max_ema_gap,
                min_rr: config.min_rr,
                risk_model: config.risk_model.to_string(),
                validity_window_candles: config.validity_window_candles,
                poll_secs: config.poll_secs,
            },
            last_tick_at: self.last_tick_at.read().clone(),
            last_tick_error: self.last_tick_error.read().clone(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

/// Full session snapshot sent to the presentation collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub symbol: String,
    pub ltf_interval: String,
    pub htf_interval: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub htf_context: Option<HtfContext>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<AdvisorResult>,

    pub signal_state: SignalStateSnapshot,
    pub config: ConfigSummary,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_error: Option<String>,
}

/// Tunables echoed back to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub htf_ema_fast: usize,
    pub htf_ema_slow: usize,
    pub near_ema_threshold: f64,
    pub min_ema_gap: Option<f64>,
    pub max_ema_gap: Option<f64>,
    pub min_rr: f64,
    pub risk_model: String,
    pub validity_window_candles: u64,
    pub poll_secs: u64,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_empty() {
        let state = AppState::new(RuntimeConfig::default());
        assert_eq!(state.current_state_version(), 1);
        assert!(state.last_context.read().is_none());
        assert!(state.last_signal.read().is_none());

        let snap = state.build_snapshot();
        assert_eq!(snap.symbol, "BTCUSDT");
        assert!(snap.signal.is_none());
        assert_eq!(snap.signal_state.closed_candle_count, 0);
    }

    #[test]
    fn version_increments_on_error_record() {
        let state = AppState::new(RuntimeConfig::default());
        let before = state.current_state_version();
        state.record_tick_error("fetch failed".to_string());
        assert!(state.current_state_version() > before);
        assert_eq!(
            state.last_tick_error.read().as_deref(),
            Some("fetch failed")
        );
    }

    #[test]
    fn snapshot_reflects_config_summary() {
        let mut config = RuntimeConfig::default();
        config.min_rr = 3.0;
        let state = AppState::new(config);
        let snap = state.build_snapshot();
        assert!((snap.config.min_rr - 3.0).abs() < f64::EPSILON);
        assert_eq!(snap.config.risk_model, "fixed_percent");
    }
}
