//! Inbound message from a channel: delivered to the gateway for turn handling.

/// A message from a channel to be handled as one bot turn.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    pub conversation_id: String,
    pub text: String,
}
