//! Per-conversation flow state store.
//!
//! Keyed by (channel_id, conversation_id). State is created lazily with the
//! default flow and overwritten on each turn; entries live as long as the
//! process. Concurrent turns for the same conversation are last-write-wins.

use crate::dialog::ConversationFlow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key for one conversation on one channel (e.g. a Telegram chat_id).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ChannelConvKey {
    pub channel_id: String,
    pub conversation_id: String,
}

/// In-memory store: (channel_id, conversation_id) -> ConversationFlow.
/// Constructed once by the gateway and injected into the bot.
pub struct FlowStore {
    inner: Arc<RwLock<HashMap<ChannelConvKey, ConversationFlow>>>,
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Flow for a conversation; the default flow if none was stored yet.
    pub async fn get_or_default(&self, channel_id: &str, conversation_id: &str) -> ConversationFlow {
        let key = ChannelConvKey {
            channel_id: channel_id.to_string(),
            conversation_id: conversation_id.to_string(),
        };
        self.inner.read().await.get(&key).cloned().unwrap_or_default()
    }

    /// Persist the flow for a conversation, overwriting any previous value.
    pub async fn set(
        &self,
        channel_id: impl Into<String>,
        conversation_id: impl Into<String>,
        flow: ConversationFlow,
    ) {
        let key = ChannelConvKey {
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
        };
        self.inner.write().await.insert(key, flow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::PendingQuestion;

    #[tokio::test]
    async fn unknown_conversation_gets_default_flow() {
        let store = FlowStore::new();
        let flow = store.get_or_default("telegram", "123").await;
        assert_eq!(flow.last_question, None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips_and_is_per_conversation() {
        let store = FlowStore::new();
        store
            .set(
                "telegram",
                "123",
                ConversationFlow {
                    last_question: Some(PendingQuestion::AskOrderId),
                },
            )
            .await;
        let flow = store.get_or_default("telegram", "123").await;
        assert_eq!(flow.last_question, Some(PendingQuestion::AskOrderId));
        let other = store.get_or_default("telegram", "456").await;
        assert_eq!(other.last_question, None);
    }
}
