use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Who asked, and where the answer has to go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorContext {
    pub actor_id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Answer {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Upstream knowledge-base chat service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn ask(&self, question: &str, actor: &ActorContext) -> Result<Answer, RelayError>;
}

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    #[serde(flatten)]
    actor: &'a ActorContext,
}

/// JSON-over-HTTP chat backend client.
pub struct HttpChatBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpChatBackend {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn ask(&self, question: &str, actor: &ActorContext) -> Result<Answer, RelayError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AskRequest { question, actor })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamStatus(status.as_u16()));
        }
        Ok(response.json::<Answer>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_request_flattens_actor_fields() {
        let actor = ActorContext {
            actor_id: "U1".into(),
            channel_id: "C1".into(),
            thread_id: None,
        };
        let body = serde_json::to_value(AskRequest {
            question: "where is my invoice?",
            actor: &actor,
        })
        .unwrap();
        assert_eq!(body["question"], "where is my invoice?");
        assert_eq!(body["actor_id"], "U1");
        assert_eq!(body["channel_id"], "C1");
    }

    #[test]
    fn answer_sources_default_to_empty() {
        let answer: Answer = serde_json::from_str(r#"{"text":"See billing."}"#).unwrap();
        assert!(answer.sources.is_empty());
    }
}
