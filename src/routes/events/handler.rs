use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{EventAccepted, FeedbackEventRequest, MessageEventRequest};
use crate::AppState;
use crate::error::RelayError;
use crate::relay::{FeedbackEvent, InboundMessage};
use crate::utils::success_to_api_response;

/// Acknowledges at once; the answer is produced on its own task.
#[axum::debug_handler]
pub async fn receive_message(
    State(state): State<AppState>,
    Json(req): Json<MessageEventRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let message = InboundMessage::try_from(req)?;
    let event_id = message.event_id.clone();

    let relay = state.relay.clone();
    state.spawn_event(async move {
        let outcome = relay.handle_message(message).await;
        tracing::debug!(?outcome, "message handled");
    });

    Ok((
        StatusCode::ACCEPTED,
        success_to_api_response(EventAccepted { event_id }),
    ))
}

#[axum::debug_handler]
pub async fn receive_feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackEventRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let event = FeedbackEvent::try_from(req)?;
    let event_id = event.event_id.clone();

    let relay = state.relay.clone();
    state.spawn_event(async move {
        let outcome = relay.handle_feedback(event).await;
        tracing::debug!(?outcome, "feedback handled");
    });

    Ok((
        StatusCode::ACCEPTED,
        success_to_api_response(EventAccepted { event_id }),
    ))
}
