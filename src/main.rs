// =============================================================================
// Pulse Advisor — Main Entry Point
// =============================================================================
//
// Signal-generation advisor for short-timeframe crypto trading. One logical
// session (symbol + timeframe pair) per process: a polling loop fetches
// candles, runs the EMA → context → advisor → lifecycle pipeline, journals
// accepted signals, and exposes the result over a read-only REST API.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod indicators;
mod journal;
mod market_data;
mod runtime_config;
mod strategy;
mod types;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::indicators::add_ema;
use crate::journal::JournalRecord;
use crate::market_data::{last_closed, CandleKey, KlineClient};
use crate::runtime_config::RuntimeConfig;
use crate::strategy::context::{build_context, build_htf_context};
use crate::types::PipelineError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Pulse Advisor starting up");

    let mut config = RuntimeConfig::load(api::rest::CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override the session symbol from env if available.
    if let Ok(symbol) = std::env::var("PULSE_SYMBOL") {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() {
            config.symbol = symbol;
        }
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("invalid runtime configuration")?;

    info!(
        symbol = %config.symbol,
        ltf = %config.ltf_interval,
        htf = %config.htf_interval,
        risk_model = %config.risk_model,
        min_rr = config.min_rr,
        "session configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));
    let kline_client = KlineClient::new();

    // ── 3. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("PULSE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    // ── 4. Evaluation loop ───────────────────────────────────────────────
    let loop_state = state.clone();
    tokio::spawn(async move {
        let poll_secs = loop_state.runtime_config.read().poll_secs;
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(poll_secs));
        info!(poll_secs, "evaluation loop starting");

        loop {
            interval.tick().await;
            match run_tick(&loop_state, &kline_client).await {
                Ok(()) => {}
                Err(e) => {
                    // A failed tick mutates no session state; the next poll
                    // is independent and may succeed.
                    warn!(error = %e, "tick failed");
                    loop_state.record_tick_error(e.to_string());
                }
            }
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(api::rest::CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Pulse Advisor shut down complete.");
    Ok(())
}

/// One evaluation tick: fetch both timeframes, run the signal pipeline, and
/// publish the result.
///
/// Everything up to the final publish step works on locals, so an error at
/// any stage leaves the session state exactly as the previous tick left it.
async fn run_tick(state: &Arc<AppState>, client: &KlineClient) -> Result<()> {
    let config = state.runtime_config.read().clone();

    // ── Fetch ────────────────────────────────────────────────────────────
    let ltf_candles = client
        .fetch_klines(&config.symbol, &config.ltf_interval, config.candle_limit)
        .await
        .context("LTF candle fetch failed")?;
    let htf_candles = client
        .fetch_klines(&config.symbol, &config.htf_interval, config.candle_limit)
        .await
        .context("HTF candle fetch failed")?;

    let ltf_key = CandleKey {
        symbol: config.symbol.clone(),
        interval: config.ltf_interval.clone(),
    };
    let htf_key = CandleKey {
        symbol: config.symbol.clone(),
        interval: config.htf_interval.clone(),
    };

    state
        .candle_buffer
        .replace(ltf_key.clone(), ltf_candles)
        .map_err(pipeline_to_anyhow)?;
    state
        .candle_buffer
        .replace(htf_key.clone(), htf_candles)
        .map_err(pipeline_to_anyhow)?;

    // ── Indicators & contexts (closed candles only) ──────────────────────
    let ltf_closed = state.candle_buffer.closed_candles(&ltf_key);
    let htf_closed = state.candle_buffer.closed_candles(&htf_key);

    let last_closed_candle = last_closed(&ltf_closed)
        .ok_or_else(|| anyhow::anyhow!("no closed LTF candle available"))?
        .clone();

    let ltf_closes: Vec<f64> = ltf_closed.iter().map(|c| c.close).collect();
    let htf_closes: Vec<f64> = htf_closed.iter().map(|c| c.close).collect();

    let ltf_emas =
        add_ema(&ltf_closes, config.ema_fast, config.ema_slow).map_err(pipeline_to_anyhow)?;
    let htf_emas = add_ema(&htf_closes, config.htf_ema_fast, config.htf_ema_slow)
        .map_err(pipeline_to_anyhow)?;

    let ctx = build_context(&ltf_closed, &ltf_emas, config.near_ema_threshold)
        .map_err(pipeline_to_anyhow)?;
    let htf_ctx = build_htf_context(&htf_closed, &htf_emas).map_err(pipeline_to_anyhow)?;

    // ── Advisor via lifecycle ────────────────────────────────────────────
    let advisor_cfg = config.advisor_config();
    let result = state
        .lifecycle
        .write()
        .evaluate(last_closed_candle.open_time, &ctx, &htf_ctx, &advisor_cfg)
        .map_err(pipeline_to_anyhow)?;

    // ── Journal accepted signals exactly once ────────────────────────────
    if result.action.is_take() && state.last_journaled_id.read().as_deref() != Some(result.id.as_str())
    {
        if let (Some(direction), Some(entry), Some(sl), Some(tp), Some(rr)) = (
            result.action.direction(),
            result.entry,
            result.sl,
            result.tp,
            result.rr,
        ) {
            state.journal.append(&JournalRecord {
                timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                symbol: config.symbol.clone(),
                ltf: config.ltf_interval.clone(),
                htf: config.htf_interval.clone(),
                direction,
                entry,
                sl,
                tp,
                rr,
            })?;
            *state.last_journaled_id.write() = Some(result.id.clone());
        }
    }

    // ── Publish ──────────────────────────────────────────────────────────
    info!(
        action = %result.action,
        trend = %ctx.trend,
        htf_trend = %htf_ctx.htf_trend,
        near_ema = ctx.near_ema,
        ema_gap = format!("{:.2}", ctx.ema_gap),
        "tick evaluated"
    );

    *state.last_context.write() = Some(ctx);
    *state.last_htf_context.write() = Some(htf_ctx);
    *state.last_signal.write() = Some(result);
    *state.last_tick_at.write() = Some(chrono::Utc::now().to_rfc3339());
    *state.last_tick_error.write() = None;
    state.increment_version();

    Ok(())
}

/// Bridge the typed pipeline taxonomy into the anyhow chain used at the
/// application boundary.
fn pipeline_to_anyhow(e: PipelineError) -> anyhow::Error {
    anyhow::Error::new(e)
}
