use std::sync::Arc;
use std::time::Duration;

use crate::cache::{RateKey, RateLimitDecision, StoreBackend, WindowStore};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::StoreError;

/// Sliding-window admission control per (identifier, action).
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    enabled: bool,
    window_ms: u64,
    max_requests: u32,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            store,
            clock,
            key_prefix: config.redis_key_prefix.clone(),
            enabled: config.rate_limit_enabled,
            window_ms: config.rate_limit_window_ms,
            max_requests: config.rate_limit_max_requests,
            store_timeout: config.rate_limit_store_timeout(),
        }
    }

    pub fn backend(&self) -> StoreBackend {
        self.store.backend()
    }

    /// Admits or denies one event for `identifier` under `action`.
    ///
    /// `reset_time` is `now + window`: an upper bound on when a slot frees up,
    /// not the exact moment the oldest entry leaves the window. A store failure,
    /// or a store that stops answering, admits the event.
    pub async fn check_limit(&self, identifier: &str, action: &str) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision {
                allowed: true,
                remaining: self.max_requests,
                reset_time: 0,
            };
        }

        let now = self.clock.now_ms();
        let reset_time = now.saturating_add(i64::try_from(self.window_ms).unwrap_or(i64::MAX));
        let key = RateKey::new(identifier, action).store_key(&self.key_prefix);

        let admitted = tokio::time::timeout(
            self.store_timeout,
            self.store.admit(&key, now, self.window_ms, self.max_requests),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout(self.store_timeout)));

        match admitted {
            Ok(admission) => {
                let used = admission.count_before + u64::from(admission.admitted);
                let remaining = u64::from(self.max_requests).saturating_sub(used) as u32;
                RateLimitDecision {
                    allowed: admission.admitted,
                    remaining,
                    reset_time,
                }
            }
            Err(e) => {
                tracing::error!(
                    identifier,
                    action,
                    "rate limit store failed, admitting request: {}",
                    e
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: self.max_requests.saturating_sub(1),
                    reset_time,
                }
            }
        }
    }
}
