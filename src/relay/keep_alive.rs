use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::messenger::Messenger;

/// Recurring "still working" signal owned by one pending answer.
///
/// The timer has no timeout of its own. It stops when `stop` is called or the
/// guard is dropped, so every exit path of the owning task releases it.
pub struct KeepAlive {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl KeepAlive {
    pub fn start(
        messenger: Arc<dyn Messenger>,
        channel_id: String,
        thread_id: Option<String>,
        every: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = messenger.still_working(&channel_id, thread_id.as_deref()).await {
                            tracing::debug!(channel_id = %channel_id, "still-working signal failed: {}", e);
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancels the signal, including a tick that is still in flight.
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::RelayError;
    use crate::relay::messenger::OutboundAnswer;

    #[derive(Default)]
    struct CountingMessenger {
        ticks: AtomicUsize,
    }

    #[async_trait]
    impl Messenger for CountingMessenger {
        async fn post_answer(&self, _answer: &OutboundAnswer) -> Result<(), RelayError> {
            Ok(())
        }

        async fn post_notice(&self, _c: &str, _a: &str, _t: &str) -> Result<(), RelayError> {
            Ok(())
        }

        async fn still_working(&self, _c: &str, _t: Option<&str>) -> Result<(), RelayError> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn signals_periodically_until_stopped() {
        let messenger = Arc::new(CountingMessenger::default());
        let keep_alive = KeepAlive::start(
            messenger.clone(),
            "C1".into(),
            None,
            Duration::from_secs(5),
        );

        tokio::time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(messenger.ticks.load(Ordering::SeqCst), 2);

        keep_alive.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(messenger.ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_guard_cancels_the_timer() {
        let messenger = Arc::new(CountingMessenger::default());
        {
            let keep_alive =
                KeepAlive::start(messenger.clone(), "C1".into(), None, Duration::from_secs(5));
            assert!(keep_alive.is_running());
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(messenger.ticks.load(Ordering::SeqCst), 0);
    }
}
