use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Default number of event keys remembered.
pub const DEFAULT_MAX_TRACKED: usize = 100;

#[derive(Default)]
struct Seen {
    order: VecDeque<String>,
    members: HashSet<String>,
}

/// Bounded "already handled" set for inbound events.
///
/// Eviction is strictly by insertion order: a key that keeps arriving is not
/// refreshed, so once it falls off the end a late duplicate is treated as new.
/// State lives only as long as the process.
pub struct DedupGuard {
    seen: Mutex<Seen>,
    max_tracked: usize,
}

impl DedupGuard {
    pub fn new(max_tracked: usize) -> Self {
        Self {
            seen: Mutex::new(Seen::default()),
            max_tracked: max_tracked.max(1),
        }
    }

    /// Returns `true` when `key` was already recorded. Otherwise records it and returns `false`.
    pub fn seen(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.members.contains(key) {
            return true;
        }

        while seen.order.len() >= self.max_tracked {
            match seen.order.pop_front() {
                Some(oldest) => {
                    seen.members.remove(&oldest);
                }
                None => break,
            }
        }
        seen.order.push_back(key.to_string());
        seen.members.insert(key.to_string());
        false
    }

    /// `true` the first time a key is offered, `false` for every repeat.
    pub fn admit_once(&self, key: &str) -> bool {
        !self.seen(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACKED)
    }
}
