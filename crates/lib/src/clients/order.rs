//! Order lookup: GET {base_url}/{order_id} and format the result.

use super::{get_json, http_client, Lookup, LookupError};
use serde::Deserialize;

/// Reply when the captured answer is not a numeric order id. No request is made.
pub const INVALID_ID: &str =
    "Isso não parece ser um ID válido. Por favor, envie apenas o número do pedido.";

/// Reply when the request or body parse fails. Logged server-side, never propagated.
pub const LOOKUP_FAILED: &str = "Ocorreu um erro. Por favor, tente novamente.";

const DATE_NOT_PROVIDED: &str = "Data não informada";
const USER_NOT_PROVIDED: &str = "Não informado";

/// Order as returned by the order service. Numeric fields stay
/// `serde_json::Number` so they render exactly as the service wrote them
/// (a total of 100.0 stays "100.0").
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    pub id: serde_json::Number,
    pub status: String,
    pub total: serde_json::Number,
    #[serde(rename = "dataPedido", default)]
    pub data_pedido: Option<String>,
    #[serde(default)]
    pub user: Option<OrderUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderUser {
    pub id: serde_json::Number,
}

/// Client for the order service.
#[derive(Clone)]
pub struct OrderClient {
    base_url: String,
    client: reqwest::Client,
}

impl OrderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(),
        }
    }

    /// GET /{order_id}.
    pub async fn fetch(&self, order_id: &str) -> Result<Lookup<OrderRecord>, LookupError> {
        let url = format!("{}/{}", self.base_url, order_id);
        get_json(&self.client, &url, &[]).await
    }
}

/// An order id answer must be decimal digits only. Validation happens here,
/// not in the dialogue engine.
pub fn is_valid_order_id(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

pub fn searching(order_id: &str) -> String {
    format!("Entendido! Buscando informações do pedido {}... ⏳", order_id)
}

pub fn render_found(order: &OrderRecord) -> String {
    let date = order
        .data_pedido
        .as_deref()
        .and_then(format_order_date)
        .unwrap_or_else(|| DATE_NOT_PROVIDED.to_string());
    let user_id = order
        .user
        .as_ref()
        .map(|u| u.id.to_string())
        .unwrap_or_else(|| USER_NOT_PROVIDED.to_string());
    format!(
        "✅ **Pedido Encontrado!**\n\n\
         ID do Pedido: {}\n\
         Status: {}\n\
         Valor Total: R$ {}\n\
         Data do Pedido: {}\n\
         ID do Usuário: {}",
        order.id, order.status, order.total, date, user_id
    )
}

pub fn render_not_found(order_id: &str) -> String {
    format!("❌ Pedido com ID `{}` não foi encontrado.", order_id)
}

/// dataPedido is an ISO-8601 string, with or without an offset. An
/// unparseable value is treated as absent.
fn format_order_date(raw: &str) -> Option<String> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format("%d/%m/%Y às %H:%M").to_string());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.format("%d/%m/%Y às %H:%M").to_string())
}
