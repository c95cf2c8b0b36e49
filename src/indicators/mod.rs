// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator computations for the advisor. Every public
// function returns `Result` so callers are forced to handle empty-series and
// bad-parameter cases instead of trading on guessed values.

pub mod ema;

pub use ema::{add_ema, EmaPair};
