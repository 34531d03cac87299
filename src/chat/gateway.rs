/// Chat Response Gateway - forwards a query to the webhook and normalizes the reply
use crate::{
    chat::reply,
    config::ChatConfig,
    error::{AppError, AppResult},
};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the chat webhook
#[derive(Clone)]
pub struct ChatGateway {
    http_client: reqwest::Client,
    webhook_url: String,
}

impl ChatGateway {
    pub fn new(config: &ChatConfig) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            webhook_url: config.webhook_url.clone(),
        })
    }

    /// Ask the upstream; failures are returned as errors
    pub async fn ask(&self, query: &str) -> AppResult<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Query cannot be empty".to_string()));
        }

        debug!("Forwarding query ({} chars) to chat webhook", query.len());

        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| AppError::Remote(format!("Chat webhook request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to read chat webhook response: {}", e)))?;

        reply::interpret(status, &body)
    }

    /// Ask the upstream and always get something displayable back
    pub async fn reply(&self, query: &str) -> Result<String, String> {
        self.ask(query).await.map_err(|e| {
            warn!("Chat gateway failed: {}", e);
            e.user_message()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct Stub {
        status: StatusCode,
        body: &'static str,
        received: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    async fn webhook(State(stub): State<Stub>, Json(body): Json<serde_json::Value>) -> Response {
        stub.received.lock().await.push(body);
        (stub.status, stub.body).into_response()
    }

    async fn spawn_gateway(status: StatusCode, body: &'static str) -> (ChatGateway, Stub) {
        let stub = Stub {
            status,
            body,
            received: Arc::new(Mutex::new(Vec::new())),
        };
        let router = Router::new()
            .route("/webhook", post(webhook))
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let gateway = ChatGateway::new(&ChatConfig {
            webhook_url: format!("http://{}/webhook", addr),
            user_agent: "RAGent/test".to_string(),
            request_timeout_secs: Some(5),
        })
        .unwrap();
        (gateway, stub)
    }

    #[tokio::test]
    async fn test_output_reply() {
        let (gateway, stub) = spawn_gateway(StatusCode::OK, r#"{"output":"hi"}"#).await;
        assert_eq!(gateway.ask("  hello  ").await.unwrap(), "hi");

        let received = stub.received.lock().await;
        assert_eq!(*received, vec![json!({ "query": "hello" })]);
    }

    #[tokio::test]
    async fn test_message_reply() {
        let (gateway, _stub) = spawn_gateway(StatusCode::OK, r#"{"message":"hi"}"#).await;
        assert_eq!(gateway.ask("hello").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_error_reply() {
        let (gateway, _stub) = spawn_gateway(StatusCode::OK, r#"{"error":"bad"}"#).await;
        let err = gateway.ask("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "bad");
        assert_eq!(gateway.reply("hello").await.unwrap_err(), "bad");
    }

    #[tokio::test]
    async fn test_plain_text_reply() {
        let (gateway, _stub) = spawn_gateway(StatusCode::OK, "plain text").await;
        assert_eq!(gateway.ask("hello").await.unwrap(), "plain text");
    }

    #[tokio::test]
    async fn test_server_error() {
        let (gateway, _stub) =
            spawn_gateway(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let err = gateway.ask("hello").await.unwrap_err();
        assert!(matches!(err, AppError::Http(500)));

        let shown = gateway.reply("hello").await.unwrap_err();
        assert!(shown.contains("500"));
    }

    #[tokio::test]
    async fn test_blank_query_is_not_sent() {
        let (gateway, stub) = spawn_gateway(StatusCode::OK, r#"{"output":"hi"}"#).await;
        let err = gateway.ask(" \n\t ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(stub.received.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_webhook() {
        let gateway = ChatGateway::new(&ChatConfig {
            webhook_url: "http://127.0.0.1:1/webhook".to_string(),
            user_agent: "RAGent/test".to_string(),
            request_timeout_secs: Some(2),
        })
        .unwrap();
        let err = gateway.ask("hello").await.unwrap_err();
        assert!(matches!(err, AppError::Remote(_)));
    }
}
