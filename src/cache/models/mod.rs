/// Value types kept by the rate limit and correlation caches.
pub mod feedback;
pub mod rate_limit;

pub use feedback::{FeedbackContext, FeedbackRecord};
pub use rate_limit::{Admission, RateLimitDecision};
