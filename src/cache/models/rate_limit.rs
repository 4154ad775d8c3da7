use serde::{Deserialize, Serialize};

/// Outcome of one atomic prune/count/insert step on a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    /// Events left in the window before this one was considered.
    pub count_before: u64,
}

/// Limiter verdict returned to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Unix milliseconds; an upper bound on when the window frees up. 0 when limiting is off.
    pub reset_time: i64,
}

impl RateLimitDecision {
    /// Milliseconds the actor should wait, measured from `now_ms`.
    pub fn retry_after_ms(&self, now_ms: i64) -> u64 {
        self.reset_time.saturating_sub(now_ms).max(0) as u64
    }
}
