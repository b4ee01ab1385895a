//! Dialogue engine: pure mapping from (flow state, incoming text) to
//! (next flow state, replies, optional lookup action).
//!
//! No I/O here. The turn handler executes the action and delivers the replies.

use crate::channels::{OutboundMessage, SuggestedAction};
use serde::{Deserialize, Serialize};

/// The question the bot is waiting to have answered, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingQuestion {
    AskOrderId,
    AskProductInfo,
}

/// Per-conversation dialogue state. One instance per conversation, created
/// lazily with no pending question. A new question overwrites any previous
/// one; there is no stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationFlow {
    pub last_question: Option<PendingQuestion>,
}

/// Outbound API call the turn handler should issue after sending the replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Answer captured while AskOrderId was pending (unvalidated).
    LookupOrder(String),
    /// Answer captured while AskProductInfo was pending (unparsed).
    LookupProduct(String),
}

/// Result of one engine step.
#[derive(Debug, Clone)]
pub struct DialogStep {
    pub flow: ConversationFlow,
    pub replies: Vec<OutboundMessage>,
    pub action: Option<Action>,
}

const MENU_TEXT: &str = "Olá! Eu sou o assistente do e-commerce. Como posso te ajudar hoje?";
const PROMPT_PRODUCT: &str =
    "Ok! Para consultar um produto, por favor, me diga o ID e a categoria no formato: `id=SEU_ID categoria=SUA_CATEGORIA`";
const PROMPT_ORDER: &str = "Ok! Por favor, me diga o ID do pedido que você quer consultar.";
const FALLBACK: &str = "Desculpe, não entendi. Diga 'oi' ou 'menu' para ver as opções.";

fn main_menu() -> OutboundMessage {
    OutboundMessage::with_actions(
        MENU_TEXT,
        vec![
            SuggestedAction::new("Consultar Produtos", "consultar produtos"),
            SuggestedAction::new("Consultar Pedido", "consultar pedido"),
            SuggestedAction::new("Extrato de Compras", "extrato de compras"),
            SuggestedAction::new("Comprar Produto", "comprar produto"),
        ],
    )
}

/// Run one engine step. The text is lowercased before matching; no other
/// normalization. A pending question always wins over menu matching: while
/// one is open, even "menu" is forwarded as the answer.
pub fn process(flow: &ConversationFlow, text: &str) -> DialogStep {
    let text = text.to_lowercase();

    match flow.last_question {
        Some(PendingQuestion::AskOrderId) => DialogStep {
            flow: ConversationFlow::default(),
            replies: Vec::new(),
            action: Some(Action::LookupOrder(text)),
        },
        Some(PendingQuestion::AskProductInfo) => DialogStep {
            flow: ConversationFlow::default(),
            replies: Vec::new(),
            action: Some(Action::LookupProduct(text)),
        },
        None => {
            // Menu mode. The greeting triggers are substring matches, the
            // two commands are exact matches.
            if text.contains("oi") || text.contains("olá") || text.contains("menu") {
                DialogStep {
                    flow: flow.clone(),
                    replies: vec![main_menu()],
                    action: None,
                }
            } else if text == "consultar produtos" {
                DialogStep {
                    flow: ConversationFlow {
                        last_question: Some(PendingQuestion::AskProductInfo),
                    },
                    replies: vec![OutboundMessage::text(PROMPT_PRODUCT)],
                    action: None,
                }
            } else if text == "consultar pedido" {
                DialogStep {
                    flow: ConversationFlow {
                        last_question: Some(PendingQuestion::AskOrderId),
                    },
                    replies: vec![OutboundMessage::text(PROMPT_ORDER)],
                    action: None,
                }
            } else {
                DialogStep {
                    flow: flow.clone(),
                    replies: vec![OutboundMessage::text(FALLBACK)],
                    action: None,
                }
            }
        }
    }
}
