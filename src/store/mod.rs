/// Remote structured store
///
/// Row-based access to the hosted backend's `profiles`, `queries` and
/// `subscriptions` tables. The REST implementation talks to the hosted
/// backend; the memory implementation backs development mode and tests.

pub mod memory;
pub mod models;
pub mod rest;

pub use memory::MemoryStore;
pub use models::{
    Plan, Profile, ProfileUpdate, QueryRecord, Role, Subscription, SubscriptionStatus,
    PLACEHOLDER_NAME,
};
pub use rest::{RestStore, RestStoreConfig};

use crate::error::AppResult;
use async_trait::async_trait;

/// Remote store operations used by the core flows
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Exactly one profile row for the id; NotFound when absent
    async fn fetch_profile(&self, user_id: &str) -> AppResult<Profile>;

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> AppResult<()>;

    async fn set_role(&self, user_id: &str, role: Role) -> AppResult<()>;

    /// Append one query record
    async fn insert_query(&self, record: &QueryRecord) -> AppResult<()>;

    /// Query records for a user, newest first
    async fn list_queries(&self, user_id: &str) -> AppResult<Vec<QueryRecord>>;

    async fn find_active_subscription(&self, user_id: &str) -> AppResult<Option<Subscription>>;

    async fn insert_subscription(&self, subscription: &Subscription) -> AppResult<()>;

    /// Update the row with the subscription's id
    async fn update_subscription(&self, subscription: &Subscription) -> AppResult<()>;
}
