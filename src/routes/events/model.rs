use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::relay::{FeedbackEvent, InboundMessage, Sentiment};

#[derive(Debug, Deserialize)]
pub struct MessageEventRequest {
    pub event_id: String,
    pub actor_id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackEventRequest {
    pub event_id: String,
    pub actor_id: String,
    pub channel_id: String,
    pub response_id: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventAccepted {
    pub event_id: String,
}

fn require(field: &str, value: &str) -> Result<(), RelayError> {
    if value.trim().is_empty() {
        return Err(RelayError::BadEvent(format!("{} is empty", field)));
    }
    Ok(())
}

impl TryFrom<MessageEventRequest> for InboundMessage {
    type Error = RelayError;

    fn try_from(req: MessageEventRequest) -> Result<Self, Self::Error> {
        require("event_id", &req.event_id)?;
        require("actor_id", &req.actor_id)?;
        require("channel_id", &req.channel_id)?;
        require("text", &req.text)?;
        Ok(InboundMessage {
            event_id: req.event_id,
            actor_id: req.actor_id,
            channel_id: req.channel_id,
            thread_id: req.thread_id.filter(|t| !t.is_empty()),
            text: req.text.trim().to_string(),
        })
    }
}

impl TryFrom<FeedbackEventRequest> for FeedbackEvent {
    type Error = RelayError;

    fn try_from(req: FeedbackEventRequest) -> Result<Self, Self::Error> {
        require("event_id", &req.event_id)?;
        require("actor_id", &req.actor_id)?;
        require("channel_id", &req.channel_id)?;
        require("response_id", &req.response_id)?;
        Ok(FeedbackEvent {
            event_id: req.event_id,
            actor_id: req.actor_id,
            channel_id: req.channel_id,
            response_id: req.response_id,
            sentiment: req.sentiment,
        })
    }
}
