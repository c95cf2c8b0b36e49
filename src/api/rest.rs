// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read-only window into the session for the presentation collaborator, plus a
// small control surface for the tunables and the manual signal lock. All
// endpoints live under `/api/v1/`. No rendering happens here; the dashboard
// is an external consumer of these snapshots.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::types::RiskModelKind;

/// Config file path shared with main.rs.
pub const CONFIG_PATH: &str = "runtime_config.json";

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/signal", get(signal))
        .route("/api/v1/journal", get(journal))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config", post(update_config))
        .route("/api/v1/signal/lock", post(lock_signal))
        .route("/api/v1/signal/unlock", post(unlock_signal))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Snapshots
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

#[derive(Serialize)]
struct SignalResponse {
    #[serde(flatten)]
    state: crate::strategy::lifecycle::SignalStateSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal: Option<crate::strategy::advisor::AdvisorResult>,
}

async fn signal(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = SignalResponse {
        state: state.lifecycle.read().snapshot(),
        signal: state.last_signal.read().clone(),
    };
    Json(resp)
}

#[derive(Serialize)]
struct JournalResponse {
    lines: Vec<String>,
}

async fn journal(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.journal.recent(100) {
        Ok(lines) => Json(JournalResponse { lines }).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to read trade journal");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.runtime_config.read().clone())
}

/// Partial update: only the supplied fields change. Validation runs on the
/// merged config; an invalid merge is rejected wholesale.
#[derive(Debug, Deserialize)]
struct UpdateConfigRequest {
    min_rr: Option<f64>,
    near_ema_threshold: Option<f64>,
    min_ema_gap: Option<Option<f64>>,
    max_ema_gap: Option<Option<f64>>,
    risk_model: Option<RiskModelKind>,
    confirm_price_position: Option<bool>,
    validity_window_candles: Option<u64>,
    poll_secs: Option<u64>,
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateConfigRequest>,
) -> impl IntoResponse {
    let mut candidate = state.runtime_config.read().clone();

    if let Some(v) = req.min_rr {
        candidate.min_rr = v;
    }
    if let Some(v) = req.near_ema_threshold {
        candidate.near_ema_threshold = v;
    }
    if let Some(v) = req.min_ema_gap {
        candidate.min_ema_gap = v;
    }
    if let Some(v) = req.max_ema_gap {
        candidate.max_ema_gap = v;
    }
    if let Some(v) = req.risk_model {
        candidate.risk_model = v;
    }
    if let Some(v) = req.confirm_price_position {
        candidate.confirm_price_position = v;
    }
    if let Some(v) = req.validity_window_candles {
        candidate.validity_window_candles = v;
    }
    if let Some(v) = req.poll_secs {
        candidate.poll_secs = v;
    }

    if let Err(e) = candidate.validate() {
        warn!(error = %e, "rejected config update");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    *state.runtime_config.write() = candidate.clone();
    state.increment_version();

    if let Err(e) = candidate.save(CONFIG_PATH) {
        warn!(error = %e, "failed to persist updated config");
    }

    info!(
        min_rr = candidate.min_rr,
        risk_model = %candidate.risk_model,
        "runtime config updated"
    );
    Json(candidate).into_response()
}

// =============================================================================
// Manual signal lock
// =============================================================================

#[derive(Serialize)]
struct LockResponse {
    locked: bool,
}

async fn lock_signal(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.lifecycle.write().lock();
    state.increment_version();
    Json(LockResponse { locked: true })
}

async fn unlock_signal(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.lifecycle.write().unlock();
    state.increment_version();
    Json(LockResponse { locked: false })
}
