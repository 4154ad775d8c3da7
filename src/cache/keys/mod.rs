/// Key builders for the shared store and the in-process guards.
pub mod event_keys;
pub mod rate_limit_keys;

pub use event_keys::{feedback_vote_key, processed_key};
pub use rate_limit_keys::RateKey;
