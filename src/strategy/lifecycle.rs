// =============================================================================
// Signal Lifecycle — freeze and expiry state machine
// =============================================================================
//
// Wraps the advisor so a decision cannot flicker between refresh ticks inside
// one still-forming candle, and cannot stay actionable past its validity
// window.
//
// States: EMPTY (no signal yet) → FRESH (frozen result on the latest closed
// candle) → EXPIRED (validity window elapsed; terminal for that signal).
//
// Invariants:
//   - Re-evaluating within the same closed candle never changes the frozen
//     signal.
//   - Once expired, every call returns SIGNAL EXPIRED until a newer candle
//     closes and the advisor re-runs.
//   - A re-run that produces the *same* action retains the prior frozen
//     signal and its expiry clock; only a changed action re-locks.
//
// One instance per trading session (symbol/timeframe pair); state never
// leaks across sessions.
// =============================================================================

use serde::Serialize;
use tracing::{debug, info};

use crate::strategy::advisor::{advise, AdvisorConfig, AdvisorResult, TradeAction};
use crate::strategy::context::{Context, HtfContext};
use crate::types::PipelineError;

/// Serialisable view of the lifecycle bookkeeping for the snapshot API.
#[derive(Debug, Clone, Serialize)]
pub struct SignalStateSnapshot {
    pub last_closed_open_time: Option<i64>,
    pub closed_candle_count: u64,
    pub signal_candle_index: u64,
    pub frozen_action: Option<TradeAction>,
    pub decision_at: Option<String>,
    pub manually_locked: bool,
}

/// Per-session signal lifecycle manager.
pub struct SignalLifecycle {
    /// Candles a frozen signal stays valid for before expiring.
    validity_window: u64,
    last_closed_open_time: Option<i64>,
    /// Closed candles observed since session start.
    closed_candle_count: u64,
    /// `closed_candle_count` at the moment the frozen signal was adopted.
    signal_candle_index: u64,
    frozen: Option<AdvisorResult>,
    decision_at: Option<String>,
    /// Manual override: pins the frozen signal and suppresses both re-locking
    /// and expiry until cleared.
    manually_locked: bool,
}

impl SignalLifecycle {
    pub fn new(validity_window: u64) -> Self {
        Self {
            validity_window: validity_window.max(1),
            last_closed_open_time: None,
            closed_candle_count: 0,
            signal_candle_index: 0,
            frozen: None,
            decision_at: None,
            manually_locked: false,
        }
    }

    /// Evaluate one tick.
    ///
    /// `last_closed_open_time` identifies the most recently closed candle; a
    /// change versus the previous tick is the only trigger for re-running the
    /// advisor. Errors propagate without mutating the frozen state.
    pub fn evaluate(
        &mut self,
        last_closed_open_time: i64,
        ctx: &Context,
        htf: &HtfContext,
        cfg: &AdvisorConfig,
    ) -> Result<AdvisorResult, PipelineError> {
        let new_candle = self.last_closed_open_time != Some(last_closed_open_time);

        if new_candle {
            if self.manually_locked {
                // The advisor is not consulted while the lock holds; only the
                // candle counter advances.
                self.closed_candle_count += 1;
                self.last_closed_open_time = Some(last_closed_open_time);
                debug!(
                    open_time = last_closed_open_time,
                    "new candle while manually locked — frozen signal pinned"
                );
            } else {
                let fresh = advise(ctx, htf, cfg)?;
                self.closed_candle_count += 1;
                self.last_closed_open_time = Some(last_closed_open_time);

                let held_action = self.frozen.as_ref().map(|r| r.action);
                if held_action != Some(fresh.action) {
                    info!(
                        action = %fresh.action,
                        open_time = last_closed_open_time,
                        candle_index = self.closed_candle_count,
                        "signal adopted"
                    );
                    self.signal_candle_index = self.closed_candle_count;
                    self.decision_at = Some(chrono::Utc::now().to_rfc3339());
                    self.frozen = Some(fresh);
                } else {
                    debug!(
                        action = %fresh.action,
                        "advisor re-affirmed held action — retaining frozen signal"
                    );
                }
            }
        }

        if self.manually_locked {
            if let Some(frozen) = &self.frozen {
                return Ok(frozen.clone());
            }
        }

        // Expiry is a terminal override for the held signal.
        if let Some(frozen) = &self.frozen {
            if frozen.action != TradeAction::Expired {
                let elapsed = self.closed_candle_count - self.signal_candle_index;
                if elapsed >= self.validity_window {
                    info!(
                        action = %frozen.action,
                        elapsed,
                        window = self.validity_window,
                        "frozen signal expired"
                    );
                    self.frozen = Some(AdvisorResult::expired());
                }
            }
        }

        match &self.frozen {
            Some(frozen) => Ok(frozen.clone()),
            // Unreachable in practice: a new candle either adopts or retains.
            None => Ok(AdvisorResult::expired()),
        }
    }

    /// Pin the current frozen signal until [`unlock`](Self::unlock).
    pub fn lock(&mut self) {
        self.manually_locked = true;
        info!("signal manually locked");
    }

    /// Clear the manual lock; automatic freeze/expiry resumes next tick.
    pub fn unlock(&mut self) {
        self.manually_locked = false;
        info!("signal manually unlocked");
    }

    pub fn is_locked(&self) -> bool {
        self.manually_locked
    }

    pub fn frozen(&self) -> Option<&AdvisorResult> {
        self.frozen.as_ref()
    }

    pub fn snapshot(&self) -> SignalStateSnapshot {
        SignalStateSnapshot {
            last_closed_open_time: self.last_closed_open_time,
            closed_candle_count: self.closed_candle_count,
            signal_candle_index: self.signal_candle_index,
            frozen_action: self.frozen.as_ref().map(|r| r.action),
            decision_at: self.decision_at.clone(),
            manually_locked: self.manually_locked,
        }
    }
}
