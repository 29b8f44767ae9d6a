//! Inbound relay: forward each eligible message to the webhook and send back its reply.
//!
//! Self-sent and empty messages are dropped. A failed webhook call is answered with the
//! fallback reply so the user always hears something back. Send failures are logged, never
//! retried.

use crate::channels::{InboundMessage, MessageHandler, ProtocolClient};
use crate::webhook::WebhookClient;
use async_trait::async_trait;
use std::sync::Arc;

/// What the relay did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Self-sent or empty; the webhook was not called.
    Skipped,
    /// Webhook answered without reply text.
    NoReply,
    /// Webhook reply delivered.
    Replied,
    /// Webhook failed; fallback reply delivered.
    Fallback,
    /// A reply or fallback was due but sending it failed.
    SendFailed,
}

/// Sends reply text back through the protocol client.
pub struct ReplyDispatcher {
    client: Arc<dyn ProtocolClient>,
}

impl ReplyDispatcher {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self { client }
    }

    /// Send `text` to `recipient`. Returns false on failure, which is logged and dropped.
    pub async fn reply(&self, recipient: &str, text: &str) -> bool {
        match self.client.send_text(recipient, text).await {
            Ok(()) => {
                log::info!("reply sent to {}", recipient);
                true
            }
            Err(e) => {
                log::warn!("sending reply to {} failed: {}", recipient, e);
                false
            }
        }
    }
}

pub struct Relay {
    webhook: WebhookClient,
    replies: ReplyDispatcher,
    fallback_reply: String,
}

impl Relay {
    pub fn new(
        webhook: WebhookClient,
        replies: ReplyDispatcher,
        fallback_reply: impl Into<String>,
    ) -> Self {
        Self {
            webhook,
            replies,
            fallback_reply: fallback_reply.into(),
        }
    }

    pub async fn process(&self, msg: &InboundMessage) -> RelayOutcome {
        if msg.from_me || msg.text.is_empty() {
            return RelayOutcome::Skipped;
        }
        log::info!("message received from {}", msg.sender);

        let (reply, outcome) = match self.webhook.notify(&msg.sender, &msg.text).await {
            Ok(Some(reply)) => (reply, RelayOutcome::Replied),
            Ok(None) => {
                log::debug!("webhook has no reply for {}", msg.sender);
                return RelayOutcome::NoReply;
            }
            Err(e) => {
                log::warn!("webhook failed for message from {}: {}", msg.sender, e);
                (self.fallback_reply.clone(), RelayOutcome::Fallback)
            }
        };

        if self.replies.reply(&msg.sender, &reply).await {
            outcome
        } else {
            RelayOutcome::SendFailed
        }
    }
}

#[async_trait]
impl MessageHandler for Relay {
    async fn handle(&self, msg: InboundMessage) {
        let outcome = self.process(&msg).await;
        log::debug!("relay: {} -> {:?}", msg.sender, outcome);
    }
}
