// Rate limit windows, event dedup and feedback correlation.
// Everything here is owned by the relay process; only the shared window store outlives it.

pub mod dedup;
pub mod feedback;
pub mod keys;
pub mod models;
pub mod operations;

pub use dedup::DedupGuard;
pub use feedback::FeedbackCorrelator;
pub use keys::RateKey;
pub use models::{Admission, FeedbackContext, FeedbackRecord, RateLimitDecision};
pub use operations::{
    LocalWindowStore, RedisWindowStore, StoreBackend, WindowStore, connect_window_store,
};
