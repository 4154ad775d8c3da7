//! Fire-and-forget counters for the relay.
//!
//! Callers hand events to a bounded channel and move on. Recording never
//! awaits and never reports failure: a full or closed queue drops the event.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    Message,
    Error,
    RateLimitHit {
        identifier: String,
        action: String,
        remaining: u32,
    },
    Duplicate,
    Feedback { positive: bool },
    CorrelationMiss,
}

#[derive(Default)]
struct Counters {
    messages: AtomicU64,
    errors: AtomicU64,
    rate_limit_hits: AtomicU64,
    duplicates: AtomicU64,
    feedback_positive: AtomicU64,
    feedback_negative: AtomicU64,
    correlation_misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub messages: u64,
    pub errors: u64,
    pub rate_limit_hits: u64,
    pub duplicates: u64,
    pub feedback_positive: u64,
    pub feedback_negative: u64,
    pub correlation_misses: u64,
}

#[derive(Clone)]
pub struct Metrics {
    tx: mpsc::Sender<MetricEvent>,
    counters: Arc<Counters>,
}

impl Metrics {
    /// Creates the handle and starts the task that drains it.
    pub fn spawn(capacity: usize, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let sink = counters.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => apply(&sink, event),
                        None => break,
                    },
                }
            }
            // count whatever was queued before shutdown
            while let Ok(event) = rx.try_recv() {
                apply(&sink, event);
            }
        });

        (Self { tx, counters }, handle)
    }

    /// Queues `event`. Must not be awaited; drops the event if the queue is full.
    pub fn record(&self, event: MetricEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!("metric dropped: {}", e);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            messages: c.messages.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            rate_limit_hits: c.rate_limit_hits.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            feedback_positive: c.feedback_positive.load(Ordering::Relaxed),
            feedback_negative: c.feedback_negative.load(Ordering::Relaxed),
            correlation_misses: c.correlation_misses.load(Ordering::Relaxed),
        }
    }
}

fn apply(counters: &Counters, event: MetricEvent) {
    let counter = match event {
        MetricEvent::Message => &counters.messages,
        MetricEvent::Error => &counters.errors,
        MetricEvent::RateLimitHit {
            identifier,
            action,
            remaining,
        } => {
            tracing::info!(identifier = %identifier, action = %action, remaining, "rate limit hit");
            &counters.rate_limit_hits
        }
        MetricEvent::Duplicate => &counters.duplicates,
        MetricEvent::Feedback { positive: true } => &counters.feedback_positive,
        MetricEvent::Feedback { positive: false } => &counters.feedback_negative,
        MetricEvent::CorrelationMiss => &counters.correlation_misses,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}
