//! Messaging-protocol client capability and its WebSocket implementation.
//!
//! The core only talks to [`ProtocolClient`]: connect, disconnect, send text, check for a
//! stored identity, and stream pairing codes. Inbound messages reach the core through the
//! [`MessageHandler`] registered with `subscribe`.

mod client;
mod dispatch;
pub mod frames;
mod inbound;
mod ws;

pub use client::{ClientError, MessageHandler, ProtocolClient};
pub use dispatch::SenderLanes;
pub use inbound::{InboundMessage, PairingEvent};
pub use ws::WsClient;
