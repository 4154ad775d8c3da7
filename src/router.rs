use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::middleware::log_errors;
use crate::routes;

/// Ingress for platform events plus a health probe.
pub fn build_router(state: AppState) -> Router {
    let event_routes = Router::new()
        .route("/events/message", post(routes::events::receive_message))
        .route("/events/feedback", post(routes::events::receive_feedback));

    Router::new()
        .merge(event_routes)
        .route("/health", get(routes::health::health))
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
