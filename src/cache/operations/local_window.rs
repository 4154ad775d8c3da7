use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{StoreBackend, WindowStore};
use crate::cache::models::Admission;
use crate::clock::Clock;
use crate::error::StoreError;

struct Window {
    stamps: VecDeque<i64>,
    window_ms: u64,
}

impl Window {
    fn prune(&mut self, now_ms: i64) {
        let window = i64::try_from(self.window_ms).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(window);
        while self.stamps.front().is_some_and(|&stamp| stamp < cutoff) {
            self.stamps.pop_front();
        }
    }
}

/// In-process window store used when no shared backend is reachable.
///
/// Each key is pruned, counted and updated while its map entry is held, and
/// the entry is never held across an await point.
pub struct LocalWindowStore {
    windows: DashMap<String, Window>,
    clock: Arc<dyn Clock>,
}

impl LocalWindowStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    pub fn admit_now(&self, key: &str, now_ms: i64, window_ms: u64, max_count: u32) -> Admission {
        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                window.window_ms = window_ms;
                window.prune(now_ms);

                let count_before = window.stamps.len() as u64;
                if count_before < u64::from(max_count) {
                    window.stamps.push_back(now_ms);
                    return Admission {
                        admitted: true,
                        count_before,
                    };
                }
                if window.stamps.is_empty() {
                    occupied.remove();
                }
                Admission {
                    admitted: false,
                    count_before,
                }
            }
            Entry::Vacant(vacant) => {
                // nothing is recorded for a denied attempt
                if max_count == 0 {
                    return Admission {
                        admitted: false,
                        count_before: 0,
                    };
                }
                vacant.insert(Window {
                    stamps: VecDeque::from([now_ms]),
                    window_ms,
                });
                Admission {
                    admitted: true,
                    count_before: 0,
                }
            }
        }
    }

    /// Drops keys whose every entry has aged out. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let mut removed = 0;
        self.windows.retain(|_, window| {
            window.prune(now_ms);
            let keep = !window.stamps.is_empty();
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl WindowStore for LocalWindowStore {
    async fn admit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        max_count: u32,
    ) -> Result<Admission, StoreError> {
        Ok(self.admit_now(key, now_ms, window_ms, max_count))
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Local
    }

    fn spawn_maintenance(
        self: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "swept stale rate limit windows");
                        }
                    }
                }
            }
        }))
    }
}
