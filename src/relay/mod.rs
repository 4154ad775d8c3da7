//! Event handling for the chat relay.
//!
//! One inbound message walks `Received -> DedupCheck -> RateCheck -> Dispatched
//! -> AwaitingUpstream -> Responded`, leaving early as `Dropped`, `RateLimited`
//! or `Failed`. The dedup and rate checks never yield on the local store, so
//! two events from the same actor are ordered before either reaches the
//! upstream call.

pub mod backend;
pub mod keep_alive;
pub mod messenger;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::keys::{feedback_vote_key, processed_key};
use crate::cache::{DedupGuard, FeedbackContext, FeedbackCorrelator};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::RelayError;
use crate::metrics::{MetricEvent, Metrics};
use crate::middleware::RateLimiter;
use crate::utils::notices;

pub use backend::{ActorContext, Answer, ChatBackend, HttpChatBackend};
pub use keep_alive::KeepAlive;
pub use messenger::{HttpMessenger, Messenger, OutboundAnswer};

pub const MESSAGE_ACTION: &str = "message";
pub const FEEDBACK_ACTION: &str = "feedback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub event_id: String,
    pub actor_id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEvent {
    pub event_id: String,
    pub actor_id: String,
    pub channel_id: String,
    pub response_id: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Dropped,
    RateLimited { retry_after_ms: u64 },
    Responded { response_id: String },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Recorded { sentiment: Sentiment },
    Expired,
    Duplicate,
    RateLimited { retry_after_ms: u64 },
}

/// Process-owned guards the relay consults before doing any work.
pub struct Guards {
    pub limiter: RateLimiter,
    pub dedup: Arc<DedupGuard>,
    pub correlator: Arc<FeedbackCorrelator>,
}

/// External services the relay talks to.
pub struct Collaborators {
    pub backend: Arc<dyn ChatBackend>,
    pub messenger: Arc<dyn Messenger>,
    pub metrics: Metrics,
}

pub struct Relay {
    guards: Guards,
    backend: Arc<dyn ChatBackend>,
    messenger: Arc<dyn Messenger>,
    metrics: Metrics,
    clock: Arc<dyn Clock>,
    chat_timeout: Duration,
    keep_alive_interval: Duration,
    feedback_enabled: bool,
}

impl Relay {
    pub fn new(
        config: &Config,
        clock: Arc<dyn Clock>,
        guards: Guards,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            guards,
            backend: collaborators.backend,
            messenger: collaborators.messenger,
            metrics: collaborators.metrics,
            clock,
            chat_timeout: config.chat_timeout(),
            keep_alive_interval: config.keep_alive_interval(),
            feedback_enabled: config.feedback_enabled,
        }
    }

    pub fn guards(&self) -> &Guards {
        &self.guards
    }

    pub async fn handle_message(&self, message: InboundMessage) -> MessageOutcome {
        self.metrics.record(MetricEvent::Message);

        // 去重
        let key = processed_key(&message.event_id, &message.actor_id);
        if self.guards.dedup.seen(&key) {
            tracing::debug!(event_id = %message.event_id, "duplicate message dropped");
            self.metrics.record(MetricEvent::Duplicate);
            return MessageOutcome::Dropped;
        }

        let decision = self
            .guards
            .limiter
            .check_limit(&message.actor_id, MESSAGE_ACTION)
            .await;
        if !decision.allowed {
            let retry_after_ms = decision.retry_after_ms(self.clock.now_ms());
            self.report_rate_limit(&message.actor_id, MESSAGE_ACTION, decision.remaining);
            self.notify(
                &message.channel_id,
                &message.actor_id,
                &notices::rate_limited(retry_after_ms),
            )
            .await;
            return MessageOutcome::RateLimited { retry_after_ms };
        }

        // 转发给问答后端，等待期间定时提示
        let actor = ActorContext {
            actor_id: message.actor_id.clone(),
            channel_id: message.channel_id.clone(),
            thread_id: message.thread_id.clone(),
        };
        let keep_alive = KeepAlive::start(
            self.messenger.clone(),
            message.channel_id.clone(),
            message.thread_id.clone(),
            self.keep_alive_interval,
        );
        let upstream = tokio::time::timeout(
            self.chat_timeout,
            self.backend.ask(&message.text, &actor),
        )
        .await;
        keep_alive.stop();

        let answer = match upstream {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => return self.fail(&message, &e).await,
            Err(_) => {
                let e = RelayError::UpstreamTimeout(self.chat_timeout);
                return self.fail(&message, &e).await;
            }
        };

        let response_id = uuid::Uuid::new_v4().to_string();
        if self.feedback_enabled {
            self.guards.correlator.register(
                &response_id,
                FeedbackContext {
                    question: message.text.clone(),
                    answer: answer.text.clone(),
                    actor_id: message.actor_id.clone(),
                    channel_id: message.channel_id.clone(),
                    thread_id: message.thread_id.clone(),
                    sources: answer.sources.clone(),
                },
            );
        }

        let outbound = OutboundAnswer {
            response_id: response_id.clone(),
            channel_id: message.channel_id.clone(),
            thread_id: message.thread_id.clone(),
            text: answer.text,
            sources: answer.sources,
            feedback: self.feedback_enabled,
        };
        if let Err(e) = self.messenger.post_answer(&outbound).await {
            self.guards.correlator.discard(&response_id);
            return self.fail(&message, &e).await;
        }

        tracing::info!(
            event_id = %message.event_id,
            actor_id = %message.actor_id,
            response_id = %response_id,
            "answer posted"
        );
        MessageOutcome::Responded { response_id }
    }

    pub async fn handle_feedback(&self, event: FeedbackEvent) -> FeedbackOutcome {
        let key = feedback_vote_key(&event.response_id, &event.actor_id);
        if self.guards.dedup.contains(&key) {
            self.metrics.record(MetricEvent::Duplicate);
            return FeedbackOutcome::Duplicate;
        }

        // 先限流，被拒绝的点击不占用投票
        let decision = self
            .guards
            .limiter
            .check_limit(&event.actor_id, FEEDBACK_ACTION)
            .await;
        if !decision.allowed {
            let retry_after_ms = decision.retry_after_ms(self.clock.now_ms());
            self.report_rate_limit(&event.actor_id, FEEDBACK_ACTION, decision.remaining);
            self.notify(
                &event.channel_id,
                &event.actor_id,
                &notices::feedback_rate_limited(retry_after_ms),
            )
            .await;
            return FeedbackOutcome::RateLimited { retry_after_ms };
        }

        // 登记投票
        if self.guards.dedup.seen(&key) {
            self.metrics.record(MetricEvent::Duplicate);
            return FeedbackOutcome::Duplicate;
        }

        // 取出记录并立即释放，同一回答只计一次
        let record = self
            .guards
            .correlator
            .resolve(&event.response_id)
            .filter(|_| self.guards.correlator.discard(&event.response_id));
        let Some(record) = record else {
            tracing::info!(
                response_id = %event.response_id,
                actor_id = %event.actor_id,
                "feedback for unknown or expired answer"
            );
            self.metrics.record(MetricEvent::CorrelationMiss);
            self.notify(&event.channel_id, &event.actor_id, notices::SESSION_EXPIRED)
                .await;
            return FeedbackOutcome::Expired;
        };

        tracing::info!(
            response_id = %event.response_id,
            actor_id = %event.actor_id,
            asked_by = %record.context.actor_id,
            sentiment = ?event.sentiment,
            question = %record.context.question,
            sources = record.context.sources.len(),
            "feedback received"
        );
        self.metrics.record(MetricEvent::Feedback {
            positive: event.sentiment == Sentiment::Positive,
        });
        self.notify(&event.channel_id, &event.actor_id, notices::FEEDBACK_THANKS)
            .await;

        FeedbackOutcome::Recorded {
            sentiment: event.sentiment,
        }
    }

    fn report_rate_limit(&self, identifier: &str, action: &str, remaining: u32) {
        tracing::warn!(identifier, action, remaining, "rate limit exceeded");
        self.metrics.record(MetricEvent::RateLimitHit {
            identifier: identifier.to_string(),
            action: action.to_string(),
            remaining,
        });
    }

    async fn fail(&self, message: &InboundMessage, error: &RelayError) -> MessageOutcome {
        tracing::error!(
            event_id = %message.event_id,
            actor_id = %message.actor_id,
            "failed to answer: {}",
            error
        );
        self.metrics.record(MetricEvent::Error);
        self.notify(&message.channel_id, &message.actor_id, notices::GENERIC_FAILURE)
            .await;
        MessageOutcome::Failed
    }

    /// Best effort; a notice that cannot be delivered is only logged.
    async fn notify(&self, channel_id: &str, actor_id: &str, text: &str) {
        if let Err(e) = self.messenger.post_notice(channel_id, actor_id, text).await {
            tracing::warn!(channel_id, actor_id, "could not deliver notice: {}", e);
        }
    }
}
