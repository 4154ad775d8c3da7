use serde::{Deserialize, Serialize};

/// What the relay needs to act on a feedback click for an earlier answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackContext {
    pub question: String,
    pub answer: String,
    pub actor_id: String,
    pub channel_id: String,
    /// Platform thread the answer was posted in, if any.
    pub thread_id: Option<String>,
    pub sources: Vec<String>,
}

/// Correlation record stored by the feedback correlator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub context: FeedbackContext,
    pub created_at: i64, // Unix milliseconds
}
