use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::models::{FeedbackContext, FeedbackRecord};
use crate::clock::Clock;

/// Default lifetime of a correlation record.
pub const DEFAULT_FEEDBACK_TTL: Duration = Duration::from_secs(600);

struct Entry {
    record: FeedbackRecord,
    generation: u64,
}

#[derive(Default)]
struct Records {
    entries: HashMap<String, Entry>,
    // (deadline_ms, generation, response_id); stale generations are skipped on pop
    expiries: BinaryHeap<Reverse<(i64, u64, String)>>,
    next_generation: u64,
}

/// Links an emitted answer to the context needed when feedback on it arrives.
///
/// Visibility is exact: a record is never returned once `ttl` has elapsed since
/// it was registered. Memory is reclaimed from a min-heap of deadlines on every
/// call and by the background purger, so an unresolved record lingers at most
/// one purge interval past its deadline.
pub struct FeedbackCorrelator {
    records: Mutex<Records>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl FeedbackCorrelator {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Records::default()),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    /// Stores `context` for `response_id`, replacing any earlier record and its deadline.
    pub fn register(&self, response_id: &str, context: FeedbackContext) -> FeedbackRecord {
        let now = self.clock.now_ms();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        purge(&mut records, now);

        let generation = records.next_generation;
        records.next_generation += 1;

        let record = FeedbackRecord {
            context,
            created_at: now,
        };
        records.entries.insert(
            response_id.to_string(),
            Entry {
                record: record.clone(),
                generation,
            },
        );
        records
            .expiries
            .push(Reverse((now.saturating_add(self.ttl_ms), generation, response_id.to_string())));
        record
    }

    /// Looks a record up without consuming it. Expired records read as absent.
    pub fn resolve(&self, response_id: &str) -> Option<FeedbackRecord> {
        let now = self.clock.now_ms();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        purge(&mut records, now);

        records
            .entries
            .get(response_id)
            .filter(|entry| now.saturating_sub(entry.record.created_at) < self.ttl_ms)
            .map(|entry| entry.record.clone())
    }

    /// Frees a record once its feedback has been handled. Safe to repeat.
    pub fn discard(&self, response_id: &str) -> bool {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.entries.remove(response_id).is_some()
    }

    /// Reclaims every record past its deadline. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        purge(&mut records, now)
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spawn_purger(
        self: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = self.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "expired feedback records");
                        }
                    }
                }
            }
        })
    }
}

fn purge(records: &mut Records, now: i64) -> usize {
    let mut purged = 0;
    while let Some(Reverse((deadline, _, _))) = records.expiries.peek() {
        if *deadline > now {
            break;
        }
        let Some(Reverse((_, generation, id))) = records.expiries.pop() else {
            break;
        };
        let current = records
            .entries
            .get(&id)
            .is_some_and(|entry| entry.generation == generation);
        if current {
            records.entries.remove(&id);
            purged += 1;
        }
    }
    purged
}
