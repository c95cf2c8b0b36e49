// =============================================================================
// Binance REST kline fetcher — the market-data collaborator
// =============================================================================
//
// The core pipeline never talks to the network itself; this client supplies a
// validated candle window per poll. A fetch failure surfaces as an error,
// never as an empty-but-"valid" series, so the pipeline can distinguish "no
// usable data" from a quiet market. The client does not retry — the next poll
// tick is independent.
// =============================================================================

use anyhow::{Context, Result};
use tracing::debug;

use crate::market_data::candle_buffer::Candle;

/// Public klines endpoint; no API key or request signing required.
const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// REST client for the Binance `/api/v3/klines` endpoint.
#[derive(Clone)]
pub struct KlineClient {
    base_url: String,
    client: reqwest::Client,
}

impl KlineClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a different host (integration tests, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Fetch the most recent `limit` candles for `(symbol, interval)`,
    /// oldest-first, as Binance returns them.
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        debug!(symbol, interval, limit, "fetching klines");

        let rows: Vec<serde_json::Value> = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .context("kline request failed")?
            .error_for_status()
            .context("kline request returned an error status")?
            .json()
            .await
            .context("failed to decode kline response body")?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            candles.push(parse_kline_row(row, now_ms)?);
        }

        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

impl Default for KlineClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one kline row from the REST response.
///
/// Expected shape (array form):
/// ```json
/// [openTime, "open", "high", "low", "close", "volume", closeTime, ...]
/// ```
/// A candle whose close time lies in the future is still forming.
fn parse_kline_row(row: &serde_json::Value, now_ms: i64) -> Result<Candle> {
    let arr = row.as_array().context("kline row is not an array")?;
    if arr.len() < 7 {
        anyhow::bail!("kline row has {} fields, expected at least 7", arr.len());
    }

    let open_time = arr[0].as_i64().context("missing kline open time")?;
    let close_time = arr[6].as_i64().context("missing kline close time")?;

    let open = parse_string_f64(&arr[1], "open")?;
    let high = parse_string_f64(&arr[2], "high")?;
    let low = parse_string_f64(&arr[3], "low")?;
    let close = parse_string_f64(&arr[4], "close")?;
    let volume = parse_string_f64(&arr[5], "volume")?;

    Ok(Candle {
        open_time,
        close_time,
        open,
        high,
        low,
        close,
        volume,
        is_closed: close_time <= now_ms,
    })
}

/// Helper: Binance sends numeric values as JSON strings inside kline rows.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
