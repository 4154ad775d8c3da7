/// Window store backends behind one capability interface.
pub mod local_window;
pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::models::Admission;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::StoreError;

pub use local_window::LocalWindowStore;
pub use rate_limit::RedisWindowStore;

/// How long startup waits for the shared backend before giving up on it.
pub const SHARED_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Shared,
    Local,
}

/// Atomic counter-with-expiry primitive used by the rate limiter.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Prune entries older than `now_ms - window_ms`, count the rest, and record
    /// `now_ms` only if the count is below `max_count`. All of it is observed as one step.
    async fn admit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        max_count: u32,
    ) -> Result<Admission, StoreError>;

    fn backend(&self) -> StoreBackend;

    /// Starts background upkeep, if the backend needs any.
    fn spawn_maintenance(
        self: Arc<Self>,
        _every: Duration,
        _shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        None
    }
}

/// Picks the backend once for the process lifetime.
///
/// A missing or unreachable `REDIS_URL` falls back to the local store for good;
/// no reconnect is attempted later.
pub async fn connect_window_store(config: &Config, clock: Arc<dyn Clock>) -> Arc<dyn WindowStore> {
    let Some(url) = config.redis_url.as_deref() else {
        tracing::info!("REDIS_URL not set, using in-process rate limit store");
        return Arc::new(LocalWindowStore::new(clock));
    };

    match tokio::time::timeout(SHARED_CONNECT_TIMEOUT, RedisWindowStore::connect(url)).await {
        Ok(Ok(store)) => {
            tracing::info!("Using shared rate limit store");
            Arc::new(store)
        }
        Ok(Err(e)) => {
            tracing::warn!(
                "Shared rate limit store unavailable, falling back to in-process store for this run: {}",
                e
            );
            Arc::new(LocalWindowStore::new(clock))
        }
        Err(_) => {
            tracing::warn!(
                "Shared rate limit store did not answer within {:?}, falling back to in-process store for this run",
                SHARED_CONNECT_TIMEOUT
            );
            Arc::new(LocalWindowStore::new(clock))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn config_with_redis(url: Option<&str>) -> Config {
        Config {
            redis_url: url.map(str::to_string),
            chat_backend_url: "http://chat.local".into(),
            messenger_url: "http://platform.local".into(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn no_redis_url_selects_local_store() {
        let store = connect_window_store(&config_with_redis(None), Arc::new(ManualClock::new(0))).await;
        assert_eq!(store.backend(), StoreBackend::Local);
    }

    #[tokio::test]
    async fn unreachable_redis_falls_back_to_local_store() {
        let config = config_with_redis(Some("redis://127.0.0.1:1/"));
        let store = connect_window_store(&config, Arc::new(ManualClock::new(0))).await;
        assert_eq!(store.backend(), StoreBackend::Local);
    }

    #[tokio::test]
    async fn malformed_redis_url_falls_back_to_local_store() {
        let config = config_with_redis(Some("not-a-redis-url"));
        let store = connect_window_store(&config, Arc::new(ManualClock::new(0))).await;
        assert_eq!(store.backend(), StoreBackend::Local);
    }
}
