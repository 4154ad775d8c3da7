use axum::Json;
use serde::Serialize;

use crate::result::ApiResult;

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResult<T>> {
    Json(ApiResult::success(data))
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// Text shown to the person chatting with the bot.
pub mod notices {
    pub const GENERIC_FAILURE: &str =
        "Sorry, something went wrong while answering. Please try again later.";

    pub const SESSION_EXPIRED: &str =
        "This answer is too old to rate. Please ask your question again.";

    pub const STILL_WORKING: &str = "Still looking into it...";

    pub const FEEDBACK_THANKS: &str = "Thanks, your feedback has been recorded.";

    pub fn rate_limited(retry_after_ms: u64) -> String {
        format!(
            "You're sending messages too quickly. Please wait {} and try again.",
            wait(retry_after_ms)
        )
    }

    pub fn feedback_rate_limited(retry_after_ms: u64) -> String {
        format!(
            "You're rating answers too quickly. Please wait {} and rate again.",
            wait(retry_after_ms)
        )
    }

    fn wait(retry_after_ms: u64) -> String {
        match retry_after_ms.div_ceil(1000).max(1) {
            1 => "1 second".to_string(),
            seconds => format!("{seconds} seconds"),
        }
    }
}
