//! # Mirror-Keeper HTTP Service
//!
//! HTTP surface of the mirror:
//!
//! - `POST /webhooks/github`: webhook intake. Signature verification over
//!   the exact raw body bytes, then dispatch. Always answers a definitive
//!   status: 200 on acceptance, 401 on a bad signature, 500 on processing
//!   failure so the sender retries.
//! - `POST /api/sync/full`: operator-triggered full reconciliation of one
//!   installation, bearer-token gated.
//! - `POST /api/sync/repositories`: initial/repair repository sync.
//! - `POST /api/sync/replay-linkage`: repository linkage replay from the
//!   webhook delivery log.
//! - `GET /health`, `GET /webhooks/github/health`: liveness probes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use github_app_sdk::webhook::{verify_signature, SignatureOutcome};
use mirror_keeper_core::{EventDispatcher, ReconciliationEngine};

pub mod config;

pub use config::ServiceConfig;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: EventDispatcher,
    pub engine: Arc<ReconciliationEngine>,
    /// Shared webhook secret; `None` enables the (logged) insecure dev mode.
    pub webhook_secret: Option<String>,
    /// Bearer token gating the admin surface; `None` leaves it open (dev).
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(
        dispatcher: EventDispatcher,
        engine: Arc<ReconciliationEngine>,
        webhook_secret: Option<String>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            dispatcher,
            engine,
            webhook_secret,
            admin_token,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route("/webhooks/github", post(handle_webhook))
        .route("/webhooks/github/health", get(handle_health));

    let admin_routes = Router::new()
        .route("/api/sync/full", post(handle_sync_full))
        .route("/api/sync/repositories", post(handle_sync_repositories))
        .route("/api/sync/replay-linkage", post(handle_replay_linkage));

    Router::new()
        .merge(webhook_routes)
        .merge(admin_routes)
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {host}:{port}: {e}"))?;

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Webhook intake
// ============================================================================

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(event_type) = header_value(&headers, "x-github-event") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "missing X-GitHub-Event header"})),
        )
            .into_response();
    };
    let delivery_id = header_value(&headers, "x-github-delivery");
    let signature = header_value(&headers, "x-hub-signature-256");

    info!(
        event_type = %event_type,
        delivery_id = ?delivery_id,
        "received GitHub webhook"
    );

    // Verify over the exact wire bytes; a re-serialized payload would not
    // produce the same digest.
    let outcome = verify_signature(
        state.webhook_secret.as_deref(),
        signature.as_deref(),
        &body,
    );
    if outcome == SignatureOutcome::Rejected {
        warn!(delivery_id = ?delivery_id, "invalid webhook signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid signature"})),
        )
            .into_response();
    }

    match state
        .dispatcher
        .handle(
            &event_type,
            &body,
            signature.as_deref(),
            delivery_id.as_deref(),
        )
        .await
    {
        Ok(outcome) => {
            info!(
                event_type = %event_type,
                delivery_log_id = outcome.delivery_log_id,
                handled = outcome.handled,
                "webhook processed"
            );
            (StatusCode::OK, Json(serde_json::json!({"status": "success"}))).into_response()
        }
        Err(e) => {
            // A definitive 5xx engages the sender's retry; the attempt is
            // already durably logged with its error.
            error!(event_type = %event_type, error = %e, "webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "internal server error",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Administrative sync triggers
// ============================================================================

#[derive(Debug, Deserialize)]
struct SyncParams {
    installation_id: i64,
}

#[derive(Debug, Deserialize)]
struct ReplayParams {
    installation_id: Option<i64>,
}

async fn handle_sync_full(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SyncParams>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    info!(installation_id = params.installation_id, "full sync requested");
    let summary = state.engine.sync_full(params.installation_id).await;

    // Callers always get the structured summary, even on failure.
    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(summary)).into_response()
}

async fn handle_sync_repositories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SyncParams>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    info!(
        installation_id = params.installation_id,
        "repository sync requested"
    );
    let summary = state.engine.sync_repositories(params.installation_id).await;

    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(summary)).into_response()
}

async fn handle_replay_linkage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReplayParams>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    info!(installation_id = ?params.installation_id, "linkage replay requested");
    let report = state
        .engine
        .replay_repository_linkage(params.installation_id)
        .await;

    (StatusCode::OK, Json(report)).into_response()
}

// ============================================================================
// Shared helpers
// ============================================================================

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Bearer-token gate for the admin surface.
///
/// With no token configured the gate is open; that is only acceptable in
/// development and is logged as such.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.admin_token.as_deref() else {
        warn!("admin bearer token not configured - accepting request WITHOUT authentication");
        return Ok(());
    };

    let presented = header_value(headers, "authorization");
    match presented.as_deref() {
        Some(value) if value == format!("Bearer {expected}") => Ok(()),
        _ => {
            warn!("rejected admin request with missing or wrong bearer token");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "unauthorized"})),
            )
                .into_response())
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
