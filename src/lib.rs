/// RAGent library
///
/// Session/profile synchronization, the chat gateway and query persistence,
/// plus the HTTP API that exposes them.
pub mod api;
pub mod chat;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod notify;
pub mod profile;
pub mod server;
pub mod session;
pub mod store;
pub mod subscription;
