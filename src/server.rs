//! HTTP surface: receives inbound events and reports the disposition.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{info, warn};

use crate::pipeline::{Forwarder, SesEvent};

/// Build the router for the event endpoint and health check.
pub fn routes(forwarder: Arc<Forwarder>) -> Router {
    Router::new()
        .route("/events", post(handle_event))
        .route("/health", get(health))
        .with_state(forwarder)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ses-forwarder"
    }))
}

async fn handle_event(
    State(forwarder): State<Arc<Forwarder>>,
    Json(event): Json<SesEvent>,
) -> Response {
    info!(records = event.records.len(), "Received inbound event");

    match forwarder.handle_event(&event).await {
        Ok(disposition) => (StatusCode::OK, Json(disposition)).into_response(),
        Err(e) => {
            warn!(error = %e, "Rejected inbound event");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
