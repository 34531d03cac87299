/// Session reconciliation driven by identity provider events
use ragent::{
    db,
    identity::{Credentials, IdentityProvider, LocalIdentityProvider, Registration},
    profile::ProfileFetcher,
    session::{AuthState, SessionCache, SessionReconciler},
    store::{MemoryStore, Profile},
};
use std::sync::Arc;
use std::time::Duration;

/// Wait until the cache holds `expected`'s profile (or is empty for None)
async fn wait_for_cache(cache: &SessionCache, expected: Option<&str>) -> Option<Profile> {
    for _ in 0..100 {
        let cached = cache.load().await.unwrap();
        if cached.as_ref().map(|p| p.id.as_str()) == expected {
            return cached;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("cache never reached {:?}", expected);
}

async fn file_cache(dir: &tempfile::TempDir) -> SessionCache {
    let pool = db::create_pool(&dir.path().join("cache.sqlite"), db::DatabaseOptions::default())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    SessionCache::new(pool)
}

#[tokio::test]
async fn events_keep_cache_in_step_with_session() {
    let store = MemoryStore::new();
    let identity: Arc<dyn IdentityProvider> = Arc::new(LocalIdentityProvider::new(store.clone()));
    let cache = SessionCache::new(db::create_memory_pool().await.unwrap());
    let reconciler = Arc::new(SessionReconciler::new(
        cache.clone(),
        ProfileFetcher::new(Arc::new(store.clone())),
    ));
    reconciler.listen(Arc::clone(&identity));

    let ivan = identity
        .sign_up(&Registration::new("Ivan", "ivan@example.com", "secret1"))
        .await
        .unwrap()
        .unwrap();
    let cached = wait_for_cache(&cache, Some(&ivan.user_id)).await.unwrap();
    assert_eq!(cached.display_name(), "Ivan");

    identity.sign_out().await.unwrap();
    wait_for_cache(&cache, None).await;

    let olena = identity
        .sign_up(&Registration::new("Olena", "olena@example.com", "secret2"))
        .await
        .unwrap()
        .unwrap();
    wait_for_cache(&cache, Some(&olena.user_id)).await;

    // Switching users without an explicit sign-out
    identity
        .sign_in(&Credentials::new("ivan@example.com", "secret1"))
        .await
        .unwrap();
    wait_for_cache(&cache, Some(&ivan.user_id)).await;
    assert_eq!(reconciler.current_user_id().await.as_deref(), Some(ivan.user_id.as_str()));
}

#[tokio::test]
async fn cache_survives_restart_until_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let identity = LocalIdentityProvider::new(store.clone());
    let session = identity
        .sign_up(&Registration::new("Ivan", "ivan@example.com", "secret1"))
        .await
        .unwrap()
        .unwrap();

    {
        let reconciler = SessionReconciler::new(
            file_cache(&dir).await,
            ProfileFetcher::new(Arc::new(store.clone())),
        );
        reconciler.reconcile(Some(&session)).await.unwrap();
    }
    assert_eq!(store.profile_reads(), 1);

    // Same session after a restart: served from the cache
    let cache = file_cache(&dir).await;
    let reconciler = SessionReconciler::new(
        cache.clone(),
        ProfileFetcher::new(Arc::new(store.clone())),
    );
    let state = reconciler.reconcile(Some(&session)).await.unwrap();
    assert_eq!(state.display_name(), Some("Ivan"));
    assert_eq!(store.profile_reads(), 1);

    // No session at startup: the leftover profile is dropped
    let state = reconciler.reconcile(None).await.unwrap();
    assert_eq!(state, AuthState::LoggedOut);
    assert!(cache.load().await.unwrap().is_none());
}
