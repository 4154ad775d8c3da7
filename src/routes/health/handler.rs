use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::AppState;
use crate::cache::StoreBackend;
use crate::metrics::MetricsSnapshot;
use crate::utils::success_to_api_response;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub rate_limit_store: StoreBackend,
    pub tracked_events: usize,
    pub pending_feedback: usize,
    pub metrics: MetricsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let guards = state.relay.guards();
    let report = HealthReport {
        status: "ok",
        rate_limit_store: guards.limiter.backend(),
        tracked_events: guards.dedup.len(),
        pending_feedback: guards.correlator.len(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, success_to_api_response(report))
}
