// =============================================================================
// Strategy Module
// =============================================================================
//
// The decision core of the advisor:
// - Context extraction from an indicator-augmented candle series
// - Entry-gate rule evaluation (HTF alignment, chop, pullback, RR)
// - Stop/target computation under a configurable risk model
// - Signal freeze/expiry lifecycle

pub mod advisor;
pub mod context;
pub mod lifecycle;
pub mod risk;

pub use advisor::{advise, AdvisorConfig, AdvisorResult, TradeAction};
pub use context::{build_context, build_htf_context, Context, HtfContext};
pub use lifecycle::{SignalLifecycle, SignalStateSnapshot};
pub use risk::{calculate_rr, RiskModel, TradeLevels};
