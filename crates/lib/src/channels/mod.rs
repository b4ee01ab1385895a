//! Communication channels (e.g. Telegram).
//!
//! Channel trait and registry so the gateway can start/stop channel connectors
//! and route messages. Inbound messages are sent to the gateway for turn handling.

mod inbound;
mod outbound;
mod registry;
mod telegram;

pub use inbound::InboundMessage;
pub use outbound::{OutboundMessage, SuggestedAction};
pub use registry::{ChannelHandle, ChannelRegistry};
pub use telegram::{TelegramChannel, TelegramUpdate};
