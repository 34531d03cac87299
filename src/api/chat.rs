/// Chat and query history endpoints
use crate::{
    chat::{ChatExchange, ChatMessage},
    context::AppContext,
    error::AppResult,
    store::QueryRecord,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/chat", post(submit))
        .route("/api/chat/transcript", get(transcript))
        .route("/api/queries", get(list_queries))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// Submit a query; blank input answers `null`
async fn submit(
    State(ctx): State<AppContext>,
    Json(req): Json<ChatRequest>,
) -> AppResult<Json<Option<ChatExchange>>> {
    // Anonymous chat is allowed; the exchange is only recorded for a known user
    let user_id = ctx.reconciler.current_user_id().await;
    let exchange = ctx.chat.submit(&req.query, user_id.as_deref()).await?;
    Ok(Json(exchange))
}

async fn transcript(State(ctx): State<AppContext>) -> Json<Vec<ChatMessage>> {
    let user_id = ctx.reconciler.current_user_id().await;
    Json(ctx.chat.transcript(user_id.as_deref()).await)
}

/// Recorded exchanges for the signed-in user, newest first
async fn list_queries(State(ctx): State<AppContext>) -> AppResult<Json<Vec<QueryRecord>>> {
    let user_id = ctx.require_user().await?;
    let records = ctx.store.list_queries(&user_id).await?;
    Ok(Json(records))
}
