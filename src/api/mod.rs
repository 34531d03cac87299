/// API routes and handlers
pub mod auth;
pub mod chat;
pub mod notices;
pub mod profile;
pub mod subscription;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(profile::routes())
        .merge(chat::routes())
        .merge(subscription::routes())
        .merge(notices::routes())
}
