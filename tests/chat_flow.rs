/// End-to-end chat exchange against a stub webhook
use axum::{extract::State, routing::post, Json, Router};
use ragent::{
    chat::{ChatGateway, ChatRole, ChatSession, QueryRecorder, RecordOutcome},
    config::ChatConfig,
    notify::Notifier,
    store::{MemoryStore, RemoteStore},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

type Received = Arc<Mutex<Vec<Value>>>;

async fn rag_webhook(State(received): State<Received>, Json(body): Json<Value>) -> Json<Value> {
    received.lock().await.push(body);
    Json(json!({ "output": "RAG combines retrieval and generation." }))
}

async fn spawn_webhook() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/webhook/rag", post(rag_webhook))
        .with_state(Arc::clone(&received));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}/webhook/rag", addr), received)
}

fn chat_session(webhook_url: String, store: &MemoryStore) -> ChatSession {
    let gateway = ChatGateway::new(&ChatConfig {
        webhook_url,
        user_agent: "RAGent/test".to_string(),
        request_timeout_secs: Some(5),
    })
    .unwrap();
    let recorder = QueryRecorder::new(Arc::new(store.clone()), Notifier::new());
    ChatSession::new(gateway, recorder)
}

#[tokio::test]
async fn what_is_rag_is_answered_and_recorded() {
    let (webhook_url, received) = spawn_webhook().await;
    let store = MemoryStore::new();
    let chat = chat_session(webhook_url, &store);

    let exchange = chat
        .submit("What is RAG?", Some("u1"))
        .await
        .unwrap()
        .expect("exchange");

    assert_eq!(
        *received.lock().await,
        vec![json!({ "query": "What is RAG?" })]
    );

    let transcript = chat.transcript(Some("u1")).await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].role, ChatRole::Assistant);
    assert_eq!(
        transcript[1].content,
        "RAG combines retrieval and generation."
    );
    assert_eq!(exchange.record, RecordOutcome::Recorded);

    let records = store.list_queries("u1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, "u1");
    assert_eq!(records[0].query, "What is RAG?");
    assert_eq!(records[0].response, "RAG combines retrieval and generation.");
}

#[tokio::test]
async fn anonymous_exchange_is_not_recorded() {
    let (webhook_url, received) = spawn_webhook().await;
    let store = MemoryStore::new();
    let chat = chat_session(webhook_url, &store);

    let exchange = chat.submit("What is RAG?", None).await.unwrap().unwrap();
    assert_eq!(exchange.record, RecordOutcome::Skipped);
    assert_eq!(received.lock().await.len(), 1);
    assert!(store.queries().await.is_empty());
}

#[tokio::test]
async fn retried_submission_records_twice() {
    let (webhook_url, _received) = spawn_webhook().await;
    let store = MemoryStore::new();
    let chat = chat_session(webhook_url, &store);

    chat.submit("What is RAG?", Some("u1")).await.unwrap();
    chat.submit("What is RAG?", Some("u1")).await.unwrap();

    // No deduplication key
    assert_eq!(store.list_queries("u1").await.unwrap().len(), 2);
}
