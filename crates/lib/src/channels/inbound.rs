//! Events a protocol client delivers to the core: inbound chat messages and pairing progress.

/// A chat message received over the messaging session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Opaque sender address; replies go back to it unchanged.
    pub sender: String,
    pub text: String,
    /// True when the message was sent by this account (e.g. from another linked device).
    pub from_me: bool,
}

/// One item of the pairing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A code to show the operator as a scannable pattern. Codes may be reissued.
    Code(String),
    /// Any other pairing lifecycle event, by name (e.g. "success", "timeout").
    Other(String),
}
