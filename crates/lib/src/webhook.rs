//! Webhook client: POST each inbound message as `{sender, message}` and read an optional reply.
//!
//! One attempt per message with a bounded timeout. No retries.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body sent to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRequest<'a> {
    pub sender: &'a str,
    pub message: &'a str,
}

/// Response body expected from the webhook. A missing or null `message` means "no reply".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("webhook returned non-200 status: {0}")]
    Status(u16),
    #[error("reading webhook response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("decoding webhook response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for the configured webhook endpoint.
#[derive(Clone)]
pub struct WebhookClient {
    url: String,
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(WebhookError::Transport)?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `{sender, message}`. Returns the reply text, or None when the webhook has nothing to say.
    pub async fn notify(&self, sender: &str, message: &str) -> Result<Option<String>, WebhookError> {
        let body = WebhookRequest { sender, message };
        let res = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WebhookError::Timeout(e)
                } else {
                    WebhookError::Transport(e)
                }
            })?;
        let status = res.status();
        if status != reqwest::StatusCode::OK {
            return Err(WebhookError::Status(status.as_u16()));
        }
        let bytes = res.bytes().await.map_err(|e| {
            if e.is_timeout() {
                WebhookError::Timeout(e)
            } else {
                WebhookError::Body(e)
            }
        })?;
        let data: WebhookResponse = serde_json::from_slice(&bytes)?;
        log::debug!("webhook accepted message from {}", sender);
        Ok(data.message.filter(|m| !m.is_empty()))
    }
}
