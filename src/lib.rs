use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use cache::{DedupGuard, FeedbackCorrelator, connect_window_store};
use clock::{Clock, MonotonicClock};
use config::Config;
use error::RelayError;
use metrics::Metrics;
use middleware::RateLimiter;
use relay::{ChatBackend, Collaborators, Guards, HttpChatBackend, HttpMessenger, Messenger, Relay};

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod relay;
pub mod result;
pub mod router;
pub mod routes;
pub mod utils;

/// How often unresolved feedback records past their deadline are reclaimed.
pub const FEEDBACK_PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// Extra time on top of the chat timeout that shutdown gives in-flight events
/// to post their answer or failure notice.
pub const EVENT_DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub relay: Arc<Relay>,
    pub metrics: Metrics,
    lifecycle: Arc<Lifecycle>,
}

struct Lifecycle {
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    events: TaskTracker,
}

impl AppState {
    /// Builds the relay against the configured HTTP collaborators.
    pub async fn init(config: Config) -> Result<Self, RelayError> {
        config.validate()?;
        let backend = Arc::new(HttpChatBackend::new(
            config.chat_backend_url.clone(),
            config.chat_timeout(),
        )?);
        let messenger = Arc::new(HttpMessenger::new(config.messenger_url.clone()));
        Ok(Self::assemble(config, Arc::new(MonotonicClock::new()), backend, messenger).await)
    }

    /// Wires every component and starts the background tasks.
    pub async fn assemble(
        config: Config,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn ChatBackend>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();

        // 选择限流存储，本地存储需要定时清理
        let store = connect_window_store(&config, clock.clone()).await;
        if let Some(sweeper) = store
            .clone()
            .spawn_maintenance(config.local_sweep_interval(), shutdown.clone())
        {
            tasks.push(sweeper);
        }

        // 反馈关联记录及其过期清理
        let correlator = Arc::new(FeedbackCorrelator::new(config.feedback_ttl(), clock.clone()));
        tasks.push(
            correlator
                .clone()
                .spawn_purger(FEEDBACK_PURGE_INTERVAL, shutdown.clone()),
        );

        // 指标
        let (metrics, drain) = Metrics::spawn(config.metrics_queue_capacity, shutdown.clone());
        tasks.push(drain);

        let guards = Guards {
            limiter: RateLimiter::new(store, clock.clone(), &config),
            dedup: Arc::new(DedupGuard::new(config.dedup_max_tracked)),
            correlator,
        };
        let relay = Relay::new(
            &config,
            clock,
            guards,
            Collaborators {
                backend,
                messenger,
                metrics: metrics.clone(),
            },
        );

        Self {
            config,
            relay: Arc::new(relay),
            metrics,
            lifecycle: Arc::new(Lifecycle {
                shutdown,
                tasks: Mutex::new(tasks),
                events: TaskTracker::new(),
            }),
        }
    }

    /// Runs one event to completion on its own task, tracked until shutdown.
    pub fn spawn_event<F>(&self, event: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.lifecycle.events.spawn(event)
    }

    /// Lets in-flight events finish, then stops background tasks. Safe to call
    /// more than once.
    pub async fn shutdown(&self) {
        // 等待处理中的事件结束
        let events = &self.lifecycle.events;
        events.close();
        let grace = self.config.chat_timeout() + EVENT_DRAIN_GRACE;
        if tokio::time::timeout(grace, events.wait()).await.is_err() {
            tracing::warn!(
                pending = events.len(),
                "events still in flight after {:?}, abandoning them",
                grace
            );
        }

        // 停止后台任务
        self.lifecycle.shutdown.cancel();
        let tasks: Vec<_> = self
            .lifecycle
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("background task ended abnormally: {}", e);
            }
        }
        tracing::info!("relay shut down");
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.lifecycle.shutdown.clone()
    }
}
