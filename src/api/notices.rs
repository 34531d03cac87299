use crate::{context::AppContext, notify::Notice};
use axum::{extract::State, routing::get, Json, Router};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/notices", get(drain_notices))
}

/// Pending notices; each is returned once
async fn drain_notices(State(ctx): State<AppContext>) -> Json<Vec<Notice>> {
    Json(ctx.notifier.drain().await)
}
