//! msgbridge core library: relays chat messages from a messaging session to an HTTP webhook and
//! sends the webhook's replies back to the sender.

pub mod bridge;
pub mod channels;
pub mod config;
pub mod device;
pub mod lifecycle;
pub mod qr;
pub mod relay;
pub mod shutdown;
pub mod store;
pub mod webhook;
