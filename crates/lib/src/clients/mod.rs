//! HTTP clients for the e-commerce service (order and product lookup).
//!
//! Both lookups share one fetch-and-render routine: GET a JSON resource,
//! map 200/404/other to an outcome, and format the outcome into the reply.

pub mod order;
pub mod product;

pub use order::{OrderClient, OrderRecord, OrderUser};
pub use product::{ProductClient, ProductRecord};

use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Outcome of a lookup GET against the e-commerce service.
#[derive(Debug, Clone)]
pub enum Lookup<T> {
    /// 200 with a parsed body.
    Found(T),
    /// 404.
    NotFound,
    /// Any other status code.
    Status(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Client with a request timeout so a hung upstream cannot stall a turn forever.
fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// GET `url` and map the response: 200 parses the JSON body into `T`,
/// 404 is `NotFound`, anything else carries the raw status code. Transport
/// and body-parse failures surface as `LookupError`.
async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<Lookup<T>, LookupError> {
    let res = client.get(url).query(query).send().await?;
    let status = res.status();
    if status == reqwest::StatusCode::OK {
        let data: T = res.json().await?;
        Ok(Lookup::Found(data))
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Ok(Lookup::NotFound)
    } else {
        Ok(Lookup::Status(status.as_u16()))
    }
}

/// Shared status switch: found through the formatter, not-found to the
/// caller's message, other statuses to the generic message with the code.
pub fn render<T>(
    outcome: &Lookup<T>,
    render_found: impl FnOnce(&T) -> String,
    not_found: String,
) -> String {
    match outcome {
        Lookup::Found(v) => render_found(v),
        Lookup::NotFound => not_found,
        Lookup::Status(code) => {
            format!("😕 Houve um problema ao contatar a API. Status: {}", code)
        }
    }
}
