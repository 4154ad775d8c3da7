use async_trait::async_trait;
use serde::Serialize;

use crate::error::RelayError;

/// An answer about to be posted back to the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundAnswer {
    pub response_id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub text: String,
    pub sources: Vec<String>,
    /// Whether the message carries feedback buttons tagged with `response_id`.
    pub feedback: bool,
}

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn post_answer(&self, answer: &OutboundAnswer) -> Result<(), RelayError>;

    /// Message only `actor_id` sees.
    async fn post_notice(&self, channel_id: &str, actor_id: &str, text: &str)
    -> Result<(), RelayError>;

    /// Periodic "still working" signal while an answer is pending.
    async fn still_working(&self, channel_id: &str, thread_id: Option<&str>)
    -> Result<(), RelayError>;
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope<'a> {
    Answer(&'a OutboundAnswer),
    Notice {
        channel_id: &'a str,
        actor_id: &'a str,
        text: &'a str,
    },
    StillWorking {
        channel_id: &'a str,
        thread_id: Option<&'a str>,
        text: &'a str,
    },
}

/// Posts JSON envelopes to the platform bridge at `url`.
pub struct HttpMessenger {
    client: reqwest::Client,
    url: String,
}

impl HttpMessenger {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn send(&self, envelope: &Envelope<'_>) -> Result<(), RelayError> {
        let response = self
            .client
            .post(&self.url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| RelayError::Messenger(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Messenger(format!("status {}", status.as_u16())));
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    async fn post_answer(&self, answer: &OutboundAnswer) -> Result<(), RelayError> {
        self.send(&Envelope::Answer(answer)).await
    }

    async fn post_notice(
        &self,
        channel_id: &str,
        actor_id: &str,
        text: &str,
    ) -> Result<(), RelayError> {
        self.send(&Envelope::Notice {
            channel_id,
            actor_id,
            text,
        })
        .await
    }

    async fn still_working(
        &self,
        channel_id: &str,
        thread_id: Option<&str>,
    ) -> Result<(), RelayError> {
        self.send(&Envelope::StillWorking {
            channel_id,
            thread_id,
            text: crate::utils::notices::STILL_WORKING,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_are_tagged_by_type() {
        let notice = serde_json::to_value(Envelope::Notice {
            channel_id: "C1",
            actor_id: "U1",
            text: "hi",
        })
        .unwrap();
        assert_eq!(notice["type"], "notice");

        let answer = OutboundAnswer {
            response_id: "r1".into(),
            channel_id: "C1".into(),
            thread_id: None,
            text: "done".into(),
            sources: vec![],
            feedback: true,
        };
        let value = serde_json::to_value(Envelope::Answer(&answer)).unwrap();
        assert_eq!(value["type"], "answer");
        assert_eq!(value["response_id"], "r1");
        assert_eq!(value["feedback"], true);
    }
}
