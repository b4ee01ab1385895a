//! Integration tests: full turn sequences through the bot against a stub
//! e-commerce API served by axum on a free port. A capturing channel stands
//! in for the messaging platform.

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use lib::bot::Bot;
use lib::channels::{ChannelHandle, InboundMessage, OutboundMessage};
use lib::clients::{OrderClient, ProductClient};
use lib::state::FlowStore;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

/// Records every outbound message instead of delivering it.
struct CapturingChannel {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl CapturingChannel {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    async fn texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl ChannelHandle for CapturingChannel {
    fn id(&self) -> &str {
        "test"
    }

    fn stop(&self) {}

    async fn send(&self, _conversation_id: &str, message: &OutboundMessage) -> Result<(), String> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

async fn order_stub_handler(
    State(hits): State<Arc<AtomicUsize>>,
    Path(id): Path<String>,
) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    match id.as_str() {
        "42" => Json(json!({
            "id": 42,
            "status": "SHIPPED",
            "total": 100.0,
            "dataPedido": "2024-01-02T10:00:00",
            "user": { "id": 7 }
        }))
        .into_response(),
        "503" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve the order stub on a free port; returns (base_url, request counter).
async fn start_order_stub() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/:id", get(order_stub_handler))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), hits)
}

#[derive(Clone)]
struct ProductStub {
    hits: Arc<AtomicUsize>,
    last_category: Arc<StdMutex<Option<String>>>,
}

async fn product_stub_handler(
    State(stub): State<ProductStub>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    *stub.last_category.lock().expect("lock") = params.get("categoria").cloned();
    match id.as_str() {
        "5" => Json(json!({
            "nome": "Fone de ouvido",
            "preco": 199.9,
            "estoque": 12,
            "descricao": "Bluetooth, com estojo"
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_product_stub() -> (String, ProductStub) {
    let stub = ProductStub {
        hits: Arc::new(AtomicUsize::new(0)),
        last_category: Arc::new(StdMutex::new(None)),
    };
    let app = Router::new()
        .route("/:id", get(product_stub_handler))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), stub)
}

fn bot_with(order_base: &str, product_base: &str) -> Bot {
    Bot::new(
        Arc::new(FlowStore::new()),
        OrderClient::new(order_base),
        ProductClient::new(product_base),
    )
}

fn inbound(text: &str) -> InboundMessage {
    InboundMessage {
        channel_id: "test".to_string(),
        conversation_id: "chat-1".to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn order_lookup_round_trip_formats_the_record() {
    let (order_base, hits) = start_order_stub().await;
    let bot = bot_with(&order_base, "http://127.0.0.1:0");
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar pedido"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("42"), &channel).await.expect("answer turn");

    assert_eq!(hits.load(Ordering::SeqCst), 1, "exactly one GET");
    let texts = channel.texts().await;
    // Prompt, searching notice, formatted result.
    assert_eq!(texts.len(), 3);
    assert!(texts[1].contains("Buscando informações do pedido 42"));
    let result = &texts[2];
    assert!(result.contains("42"));
    assert!(result.contains("SHIPPED"));
    assert!(result.contains("100.0"));
    assert!(result.contains("02/01/2024 às 10:00"));
    assert!(result.contains("ID do Usuário: 7"));
}

#[tokio::test]
async fn order_not_found_echoes_the_id() {
    let (order_base, hits) = start_order_stub().await;
    let bot = bot_with(&order_base, "http://127.0.0.1:0");
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar pedido"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("99"), &channel).await.expect("answer turn");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let texts = channel.texts().await;
    assert!(texts[2].contains("99"));
    assert!(texts[2].contains("não foi encontrado"));
}

#[tokio::test]
async fn order_unexpected_status_is_reported_with_the_code() {
    let (order_base, _hits) = start_order_stub().await;
    let bot = bot_with(&order_base, "http://127.0.0.1:0");
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar pedido"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("503"), &channel).await.expect("answer turn");

    let texts = channel.texts().await;
    assert!(texts[2].contains("Status: 503"));
}

#[tokio::test]
async fn order_transport_error_gets_the_generic_retry_reply() {
    // No server listening on the base URL: the GET itself fails.
    let bot = bot_with("http://127.0.0.1:9", "http://127.0.0.1:0");
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar pedido"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("42"), &channel).await.expect("answer turn");

    let texts = channel.texts().await;
    assert!(texts[2].contains("Ocorreu um erro"));
}

#[tokio::test]
async fn non_numeric_order_id_makes_no_request() {
    let (order_base, hits) = start_order_stub().await;
    let bot = bot_with(&order_base, "http://127.0.0.1:0");
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar pedido"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("quarenta e dois"), &channel)
        .await
        .expect("answer turn");

    assert_eq!(hits.load(Ordering::SeqCst), 0, "no GET for invalid id");
    let texts = channel.texts().await;
    assert!(texts[1].contains("não parece ser um ID válido"));
}

#[tokio::test]
async fn product_lookup_sends_category_as_query_parameter() {
    let (product_base, stub) = start_product_stub().await;
    let bot = bot_with("http://127.0.0.1:0", &product_base);
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar produtos"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("id=5 categoria=eletronicos"), &channel)
        .await
        .expect("answer turn");

    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        stub.last_category.lock().expect("lock").as_deref(),
        Some("eletronicos")
    );
    let texts = channel.texts().await;
    assert!(texts[2].contains("Fone de ouvido"));
    assert!(texts[2].contains("199.9"));
    assert!(texts[2].contains("12 unidades"));
}

#[tokio::test]
async fn product_not_found_echoes_id_and_category() {
    let (product_base, stub) = start_product_stub().await;
    let bot = bot_with("http://127.0.0.1:0", &product_base);
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar produtos"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("id=8 categoria=livros"), &channel)
        .await
        .expect("answer turn");

    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    let texts = channel.texts().await;
    assert!(texts[2].contains("`8`"));
    assert!(texts[2].contains("`livros`"));
}

#[tokio::test]
async fn malformed_product_answer_makes_no_request() {
    let (product_base, stub) = start_product_stub().await;
    let bot = bot_with("http://127.0.0.1:0", &product_base);
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar produtos"), &channel)
        .await
        .expect("prompt turn");
    bot.handle_turn(&inbound("id=5"), &channel).await.expect("answer turn");

    assert_eq!(stub.hits.load(Ordering::SeqCst), 0);
    let texts = channel.texts().await;
    assert!(texts[1].contains("Formato de comando incorreto"));
}

#[tokio::test]
async fn pending_question_swallows_menu_keywords() {
    let (order_base, hits) = start_order_stub().await;
    let bot = bot_with(&order_base, "http://127.0.0.1:0");
    let channel = CapturingChannel::new();

    bot.handle_turn(&inbound("consultar pedido"), &channel)
        .await
        .expect("prompt turn");
    // "menu" is the answer to the pending question, not a command; it is not
    // numeric, so it is rejected without a request.
    bot.handle_turn(&inbound("menu"), &channel).await.expect("answer turn");

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    let texts = channel.texts().await;
    assert!(texts[1].contains("não parece ser um ID válido"));
    assert!(!texts[1].contains("assistente do e-commerce"));
}
