//! The protocol client capability consumed by the relay and the lifecycle manager.

use crate::channels::inbound::{InboundMessage, PairingEvent};
use crate::store::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("session rejected by network: {0}")]
    Rejected(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Receives inbound messages. Registered once with [`ProtocolClient::subscribe`]; the client
/// invokes it for every received message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: InboundMessage);
}

/// Handle to a messaging session.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// True when the session store already holds a paired device identity.
    async fn has_identity(&self) -> Result<bool, ClientError>;

    /// Open the pairing stream. Must be called before `connect` for the first-time flow.
    /// The stream closes once pairing finishes (successfully or not).
    async fn pairing_events(&self) -> Result<mpsc::Receiver<PairingEvent>, ClientError>;

    async fn connect(&self) -> Result<(), ClientError>;

    /// Close the session. Safe to call more than once.
    async fn disconnect(&self);

    /// Resolves once the session is no longer connected, whether the network dropped it or
    /// `disconnect` ran. Clients that never lose their session keep the default.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ClientError>;

    /// Register the handler for inbound messages, replacing any previous one.
    async fn subscribe(&self, handler: Arc<dyn MessageHandler>);
}
