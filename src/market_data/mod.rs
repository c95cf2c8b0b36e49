pub mod binance;
pub mod candle_buffer;

// Re-export the candle types for convenient access (e.g. `use crate::market_data::Candle`).
pub use binance::KlineClient;
pub use candle_buffer::{last_closed, validate_series, Candle, CandleBuffer, CandleKey};
