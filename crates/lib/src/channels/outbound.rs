//! Outbound message for a channel: reply text plus optional suggested actions.

/// A quick-reply option shown to the user. `label` is the button text;
/// `value` is the command the tap stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedAction {
    pub label: String,
    pub value: String,
}

impl SuggestedAction {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// One reply produced by a bot turn, handed to a channel for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub suggested_actions: Vec<SuggestedAction>,
}

impl OutboundMessage {
    /// Plain text reply with no suggested actions.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suggested_actions: Vec::new(),
        }
    }

    pub fn with_actions(text: impl Into<String>, actions: Vec<SuggestedAction>) -> Self {
        Self {
            text: text.into(),
            suggested_actions: actions,
        }
    }
}
