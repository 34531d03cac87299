/// Profile access
///
/// `ProfileFetcher` reads the canonical profile row; `ProfileService` handles
/// user edits, writing to the remote store before touching the cache.

use crate::{
    error::{AppError, AppResult},
    session::SessionReconciler,
    store::{Profile, ProfileUpdate, RemoteStore},
};
use std::sync::Arc;

/// One-shot profile lookups against the remote store
#[derive(Clone)]
pub struct ProfileFetcher {
    store: Arc<dyn RemoteStore>,
}

impl ProfileFetcher {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Fetch the profile for a user id; no retries
    pub async fn fetch(&self, user_id: &str) -> AppResult<Profile> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("User id cannot be empty".to_string()));
        }

        tracing::debug!("Fetching profile for {}", user_id);
        self.store.fetch_profile(user_id).await
    }
}

/// Profile edits
pub struct ProfileService {
    store: Arc<dyn RemoteStore>,
    reconciler: Arc<SessionReconciler>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn RemoteStore>, reconciler: Arc<SessionReconciler>) -> Self {
        Self { store, reconciler }
    }

    /// Update name and avatar, then refresh the cached copy
    pub async fn update(&self, user_id: &str, update: ProfileUpdate) -> AppResult<()> {
        let update = ProfileUpdate {
            name: update.name.trim().to_string(),
            avatar_url: update
                .avatar_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        };
        if update.name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        self.store.update_profile(user_id, &update).await?;

        let cached = self
            .reconciler
            .write_through(user_id, |profile| {
                profile.name = Some(update.name.clone());
                profile.avatar_url = update.avatar_url.clone();
            })
            .await?;

        tracing::info!("Updated profile for {} (cache refreshed: {})", user_id, cached);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        identity::AuthSession,
        session::SessionCache,
        store::{MemoryStore, Role},
    };
    use chrono::{Duration, Utc};

    async fn setup() -> (ProfileService, Arc<SessionReconciler>, MemoryStore) {
        let store = MemoryStore::new();
        store
            .put_profile(Profile {
                id: "u1".to_string(),
                name: Some("Ivan".to_string()),
                role: Role::Standard,
                avatar_url: None,
                email: Some("ivan@example.com".to_string()),
            })
            .await;

        let remote: Arc<dyn RemoteStore> = Arc::new(store.clone());
        let cache = SessionCache::new(db::create_memory_pool().await.unwrap());
        let reconciler = Arc::new(SessionReconciler::new(
            cache,
            ProfileFetcher::new(Arc::clone(&remote)),
        ));
        let service = ProfileService::new(remote, Arc::clone(&reconciler));
        (service, reconciler, store)
    }

    fn session(user_id: &str) -> AuthSession {
        AuthSession {
            user_id: user_id.to_string(),
            email: None,
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_id() {
        let fetcher = ProfileFetcher::new(Arc::new(MemoryStore::new()));
        let err = fetcher.fetch("  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_writes_remote_then_cache() {
        let (service, reconciler, store) = setup().await;
        reconciler.reconcile(Some(&session("u1"))).await.unwrap();

        service
            .update(
                "u1",
                ProfileUpdate {
                    name: " Ivan P. ".to_string(),
                    avatar_url: Some("https://cdn.example.com/a.png".to_string()),
                },
            )
            .await
            .unwrap();

        let remote = store.fetch_profile("u1").await.unwrap();
        assert_eq!(remote.name.as_deref(), Some("Ivan P."));

        let cached = reconciler.cached_profile().await.unwrap().unwrap();
        assert_eq!(cached.name.as_deref(), Some("Ivan P."));
        assert_eq!(cached.avatar_url.as_deref(), Some("https://cdn.example.com/a.png"));
        // Fields not edited stay as they were
        assert_eq!(cached.email.as_deref(), Some("ivan@example.com"));
    }

    #[tokio::test]
    async fn test_update_rejects_blank_name() {
        let (service, _reconciler, store) = setup().await;
        let err = service
            .update(
                "u1",
                ProfileUpdate {
                    name: "   ".to_string(),
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            store.fetch_profile("u1").await.unwrap().name.as_deref(),
            Some("Ivan")
        );
    }

    #[tokio::test]
    async fn test_failed_remote_write_leaves_cache() {
        let (service, reconciler, _store) = setup().await;
        reconciler.reconcile(Some(&session("u1"))).await.unwrap();

        let err = service
            .update(
                "ghost",
                ProfileUpdate {
                    name: "Ghost".to_string(),
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let cached = reconciler.cached_profile().await.unwrap().unwrap();
        assert_eq!(cached.name.as_deref(), Some("Ivan"));
    }
}
