//! Response backends: turn a committed utterance into reply text.

use crate::error::{VoiceError, VoiceResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Conversational backend. Errors abort the turn; the call goes back to
/// listening.
#[async_trait::async_trait]
pub trait ResponseBackend: Send + Sync {
    async fn respond(&self, text: String) -> VoiceResult<String>;
}

/// Replies with what it heard. Useful for wiring checks without a model.
#[derive(Debug, Default, Clone)]
pub struct EchoBackend;

#[async_trait::async_trait]
impl ResponseBackend for EchoBackend {
    async fn respond(&self, text: String) -> VoiceResult<String> {
        Ok(format!("You said: {}", text))
    }
}

/// Forwards committed utterances to a chat API: POST `{ "prompt", "stream": false }`,
/// reply taken from the `response` field.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    url: String,
    client: reqwest::Client,
}

impl HttpChatBackend {
    pub fn new(url: impl Into<String>) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Backend(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl ResponseBackend for HttpChatBackend {
    async fn respond(&self, text: String) -> VoiceResult<String> {
        let body = serde_json::json!({ "prompt": text, "stream": false });
        debug!("POST {} ({} chars)", self.url, text.chars().count());

        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            warn!("Chat request failed with status {}", status);
            return Err(VoiceError::Backend(format!("chat endpoint returned {}", status)));
        }

        let json = resp.json::<serde_json::Value>().await?;
        parse_chat_reply(&json)
    }
}

fn parse_chat_reply(json: &serde_json::Value) -> VoiceResult<String> {
    json.get("response")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| VoiceError::Backend("chat reply has no response text".to_string()))
}
