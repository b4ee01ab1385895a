//! Product lookup: GET {base_url}/{product_id}?categoria={category}.

use super::{get_json, http_client, Lookup, LookupError};
use serde::Deserialize;

/// Reply for a malformed answer or a failed request. Both funnel here: the
/// expected input is `id=<id> categoria=<categoria>`.
pub const FORMAT_HINT: &str =
    "Formato de comando incorreto. Por favor, use: `id=SEU_ID categoria=SUA_CATEGORIA`";

/// Product as returned by the product service.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRecord {
    pub nome: String,
    pub preco: serde_json::Number,
    pub estoque: serde_json::Number,
    pub descricao: String,
}

/// Client for the product service.
#[derive(Clone)]
pub struct ProductClient {
    base_url: String,
    client: reqwest::Client,
}

impl ProductClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(),
        }
    }

    /// GET /{product_id}?categoria={category}.
    pub async fn fetch(
        &self,
        product_id: &str,
        category: &str,
    ) -> Result<Lookup<ProductRecord>, LookupError> {
        let url = format!("{}/{}", self.base_url, product_id);
        get_json(&self.client, &url, &[("categoria", category)]).await
    }
}

/// Split the captured answer into (id, category): first whitespace token with
/// "id=" removed, second with "categoria=" removed. Tokens with other
/// prefixes pass through as-is; only a missing token is a parse failure.
pub fn parse_product_answer(text: &str) -> Option<(String, String)> {
    let mut parts = text.split_whitespace();
    let id = parts.next()?.replace("id=", "");
    let category = parts.next()?.replace("categoria=", "");
    Some((id, category))
}

pub fn searching(product_id: &str) -> String {
    format!("Entendido! Buscando informações do produto {}... ⏳", product_id)
}

pub fn render_found(product: &ProductRecord) -> String {
    format!(
        "✅ **Produto Encontrado!**\n\n\
         **Nome:** {}\n\
         **Preço:** R$ {}\n\
         **Estoque:** {} unidades\n\
         **Descrição:** {}",
        product.nome, product.preco, product.estoque, product.descricao
    )
}

pub fn render_not_found(product_id: &str, category: &str) -> String {
    format!(
        "❌ Produto com ID `{}` e categoria `{}` não foi encontrado.",
        product_id, category
    )
}
