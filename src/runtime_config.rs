// =============================================================================
// Runtime Configuration — hot-reloadable advisor settings with atomic save
// =============================================================================
//
// Every tunable the signal pipeline recognises lives here. Persistence uses
// an atomic tmp + rename pattern to prevent corruption on crash. All fields
// carry `#[serde(default)]` so that adding new fields never breaks loading an
// older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::strategy::advisor::AdvisorConfig;
use crate::strategy::risk::RiskModel;
use crate::types::{PipelineError, RiskModelKind};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_ltf_interval() -> String {
    "3m".to_string()
}

fn default_htf_interval() -> String {
    "15m".to_string()
}

fn default_candle_limit() -> usize {
    120
}

fn default_ema_fast() -> usize {
    21
}

fn default_ema_slow() -> usize {
    34
}

fn default_near_ema_threshold() -> f64 {
    0.002
}

fn default_min_ema_gap() -> Option<f64> {
    Some(25.0)
}

fn default_max_ema_gap() -> Option<f64> {
    Some(200.0)
}

fn default_min_rr() -> f64 {
    2.0
}

fn default_sl_buffer_pct() -> f64 {
    0.001
}

fn default_fixed_sl_pct() -> f64 {
    0.005
}

fn default_fixed_tp_pct() -> f64 {
    0.01
}

fn default_validity_window() -> u64 {
    1
}

fn default_poll_secs() -> u64 {
    20
}

fn default_journal_path() -> String {
    "trade_journal.csv".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Market -------------------------------------------------------------
    /// Trading symbol for this session.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Lower (trading) timeframe interval label, e.g. "3m".
    #[serde(default = "default_ltf_interval")]
    pub ltf_interval: String,

    /// Higher timeframe interval label, e.g. "15m".
    #[serde(default = "default_htf_interval")]
    pub htf_interval: String,

    /// Candles fetched per poll for each timeframe.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,

    // --- Indicators ---------------------------------------------------------
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,

    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,

    /// HTF EMA spans are configurable separately from the LTF pair.
    #[serde(default = "default_ema_fast")]
    pub htf_ema_fast: usize,

    #[serde(default = "default_ema_slow")]
    pub htf_ema_slow: usize,

    // --- Rule thresholds ----------------------------------------------------
    /// Pullback proximity: fraction of the close (0.002 = 0.2%).
    #[serde(default = "default_near_ema_threshold")]
    pub near_ema_threshold: f64,

    /// Chop floor on the absolute EMA gap (price units); too small = chop.
    #[serde(default = "default_min_ema_gap")]
    pub min_ema_gap: Option<f64>,

    /// Late-trend ceiling on the absolute EMA gap; too large = late trend.
    #[serde(default = "default_max_ema_gap")]
    pub max_ema_gap: Option<f64>,

    /// Minimum acceptable risk:reward (inclusive gate).
    #[serde(default = "default_min_rr")]
    pub min_rr: f64,

    // --- Risk model ---------------------------------------------------------
    #[serde(default)]
    pub risk_model: RiskModelKind,

    /// Stop-loss buffer beyond the fast EMA (EMA-anchored model).
    #[serde(default = "default_sl_buffer_pct")]
    pub sl_buffer_pct: f64,

    /// Stop distance as a fraction of entry (fixed-percent model).
    #[serde(default = "default_fixed_sl_pct")]
    pub fixed_sl_pct: f64,

    /// Target distance as a fraction of entry (fixed-percent model).
    #[serde(default = "default_fixed_tp_pct")]
    pub fixed_tp_pct: f64,

    /// Require price beyond both EMAs before accepting.
    #[serde(default)]
    pub confirm_price_position: bool,

    // --- Lifecycle & scheduling ---------------------------------------------
    /// How many closed candles a frozen signal stays valid for.
    #[serde(default = "default_validity_window")]
    pub validity_window_candles: u64,

    /// Polling cadence of the evaluation loop in seconds.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    /// Path of the append-only CSV trade journal.
    #[serde(default = "default_journal_path")]
    pub journal_path: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            ltf_interval: default_ltf_interval(),
            htf_interval: default_htf_interval(),
            candle_limit: default_candle_limit(),
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            htf_ema_fast: default_ema_fast(),
            htf_ema_slow: default_ema_slow(),
            near_ema_threshold: default_near_ema_threshold(),
            min_ema_gap: default_min_ema_gap(),
            max_ema_gap: default_max_ema_gap(),
            min_rr: default_min_rr(),
            risk_model: RiskModelKind::FixedPercent,
            sl_buffer_pct: default_sl_buffer_pct(),
            fixed_sl_pct: default_fixed_sl_pct(),
            fixed_tp_pct: default_fixed_tp_pct(),
            confirm_price_position: false,
            validity_window_candles: default_validity_window(),
            poll_secs: default_poll_secs(),
            journal_path: default_journal_path(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            ltf = %config.ltf_interval,
            htf = %config.htf_interval,
            risk_model = %config.risk_model,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Reject settings whose silent acceptance would change trading
    /// semantics. Called at startup and after every config update.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.symbol.trim().is_empty() {
            return Err(PipelineError::ConfigurationError(
                "symbol must not be empty".to_string(),
            ));
        }
        if self.ema_fast == 0 || self.ema_slow == 0 || self.htf_ema_fast == 0 || self.htf_ema_slow == 0 {
            return Err(PipelineError::ConfigurationError(
                "EMA spans must be > 0".to_string(),
            ));
        }
        if self.candle_limit < 2 {
            return Err(PipelineError::ConfigurationError(
                "candle_limit must be >= 2".to_string(),
            ));
        }
        if !self.near_ema_threshold.is_finite() || self.near_ema_threshold <= 0.0 {
            return Err(PipelineError::ConfigurationError(
                "near_ema_threshold must be > 0".to_string(),
            ));
        }
        if self.validity_window_candles == 0 {
            return Err(PipelineError::ConfigurationError(
                "validity_window_candles must be >= 1".to_string(),
            ));
        }
        if self.poll_secs == 0 {
            return Err(PipelineError::ConfigurationError(
                "poll_secs must be >= 1".to_string(),
            ));
        }
        self.advisor_config().validate()
    }

    /// The active stop/target model.
    pub fn active_risk_model(&self) -> RiskModel {
        match self.risk_model {
            RiskModelKind::FixedPercent => RiskModel::FixedPercent {
                sl_pct: self.fixed_sl_pct,
                tp_pct: self.fixed_tp_pct,
            },
            RiskModelKind::EmaAnchored => RiskModel::EmaAnchored {
                buffer_pct: self.sl_buffer_pct,
                rr_multiple: self.min_rr,
            },
        }
    }

    /// Assemble the entry-gate tunables consumed by the advisor.
    pub fn advisor_config(&self) -> AdvisorConfig {
        AdvisorConfig {
            min_rr: self.min_rr,
            min_ema_gap: self.min_ema_gap,
            max_ema_gap: self.max_ema_gap,
            confirm_price_position: self.confirm_price_position,
            risk_model: self.active_risk_model(),
        }
    }
}
