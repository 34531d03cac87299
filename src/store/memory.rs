/// In-process remote store
use crate::{
    error::{AppError, AppResult},
    store::{
        Profile, ProfileUpdate, QueryRecord, RemoteStore, Role, Subscription, SubscriptionStatus,
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, Profile>,
    queries: Vec<QueryRecord>,
    subscriptions: Vec<Subscription>,
}

/// Memory-backed store with the same row semantics as the hosted one
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    profile_reads: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile row
    pub async fn put_profile(&self, profile: Profile) {
        let mut tables = self.tables.write().await;
        tables.profiles.insert(profile.id.clone(), profile);
    }

    /// All query rows, oldest first
    pub async fn queries(&self) -> Vec<QueryRecord> {
        self.tables.read().await.queries.clone()
    }

    /// All subscription rows for a user
    pub async fn subscriptions_for(&self, user_id: &str) -> Vec<Subscription> {
        self.tables
            .read()
            .await
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Number of profile reads served
    pub fn profile_reads(&self) -> usize {
        self.profile_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_profile(&self, user_id: &str) -> AppResult<Profile> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        self.tables
            .read()
            .await
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user_id)))?;
        profile.name = Some(update.name.clone());
        profile.avatar_url = update.avatar_url.clone();
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: Role) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user_id)))?;
        profile.role = role;
        Ok(())
    }

    async fn insert_query(&self, record: &QueryRecord) -> AppResult<()> {
        self.tables.write().await.queries.push(record.clone());
        Ok(())
    }

    async fn list_queries(&self, user_id: &str) -> AppResult<Vec<QueryRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<QueryRecord> = tables
            .queries
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.reverse();
        Ok(records)
    }

    async fn find_active_subscription(&self, user_id: &str) -> AppResult<Option<Subscription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id && s.status == SubscriptionStatus::Active)
            .cloned())
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> AppResult<()> {
        self.tables
            .write()
            .await
            .subscriptions
            .push(subscription.clone());
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Subscription {} not found", subscription.id))
            })?;
        *row = subscription.clone();
        Ok(())
    }
}
