/// Application context and dependency injection
use crate::{
    chat::{ChatGateway, ChatSession, QueryRecorder},
    config::{AppConfig, BackendConfig},
    db,
    error::{AppError, AppResult},
    identity::{
        AuthEvent, HostedIdentityConfig, HostedIdentityProvider, IdentityProvider,
        LocalIdentityProvider,
    },
    notify::Notifier,
    profile::{ProfileFetcher, ProfileService},
    session::{SessionCache, SessionReconciler},
    store::{MemoryStore, RemoteStore, RestStore, RestStoreConfig},
    subscription::SubscriptionManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Application context holding all shared services
///
/// The single owner of the current session: built at startup, the reconciler
/// it holds clears the cached user on logout.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub cache_db: SqlitePool,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn RemoteStore>,
    pub reconciler: Arc<SessionReconciler>,
    pub profiles: Arc<ProfileService>,
    pub chat: Arc<ChatSession>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub notifier: Notifier,
    listener: Arc<JoinHandle<()>>,
    follower: Arc<JoinHandle<()>>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let cache_db =
            db::create_pool(&config.storage.cache_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&cache_db).await?;
        db::test_connection(&cache_db).await?;

        Self::with_pool(config, cache_db).await
    }

    /// Build the services on an existing cache pool (migrations already applied)
    pub async fn with_pool(config: AppConfig, cache_db: SqlitePool) -> AppResult<Self> {
        let (identity, store) = Self::backend(&config)?;

        let reconciler = Arc::new(SessionReconciler::new(
            SessionCache::new(cache_db.clone()),
            ProfileFetcher::new(Arc::clone(&store)),
        ));

        // Subscribe before the first read so no transition is missed
        let listener = reconciler.listen(Arc::clone(&identity));
        let initial = identity.current_session().await;
        reconciler
            .handle_event(AuthEvent::InitialSession(initial))
            .await;

        let notifier = Notifier::new();
        let profiles = Arc::new(ProfileService::new(
            Arc::clone(&store),
            Arc::clone(&reconciler),
        ));
        let gateway = ChatGateway::new(&config.chat)?;
        let recorder = QueryRecorder::new(Arc::clone(&store), notifier.clone());
        let chat = Arc::new(ChatSession::new(gateway, recorder));
        // Sign-outs driven by the refresh job clear the transcript too
        let follower = chat.follow_user(reconciler.watch_user());
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&store),
            Arc::clone(&reconciler),
        ));

        Ok(Self {
            config: Arc::new(config),
            cache_db,
            identity,
            store,
            reconciler,
            profiles,
            chat,
            subscriptions,
            notifier,
            listener: Arc::new(listener),
            follower: Arc::new(follower),
        })
    }

    /// Identity provider and remote store for the configured backend
    fn backend(config: &AppConfig) -> AppResult<(Arc<dyn IdentityProvider>, Arc<dyn RemoteStore>)> {
        match &config.backend {
            BackendConfig::Hosted { anon_key, .. } => {
                let auth_url = config
                    .backend
                    .auth_url()
                    .ok_or_else(|| AppError::Internal("Missing backend auth URL".to_string()))?;
                let rest_url = config
                    .backend
                    .rest_url()
                    .ok_or_else(|| AppError::Internal("Missing backend REST URL".to_string()))?;

                let identity = HostedIdentityProvider::new(HostedIdentityConfig {
                    base_url: auth_url,
                    anon_key: anon_key.clone(),
                    user_agent: config.chat.user_agent.clone(),
                })?;
                let store = RestStore::new(
                    RestStoreConfig {
                        base_url: rest_url,
                        anon_key: anon_key.clone(),
                        user_agent: config.chat.user_agent.clone(),
                    },
                    identity.token(),
                )?;

                tracing::info!("Using hosted backend");
                Ok((Arc::new(identity), Arc::new(store)))
            }
            BackendConfig::Memory => {
                let store = MemoryStore::new();
                let identity = LocalIdentityProvider::new(store.clone());

                tracing::info!("Using in-memory backend (development mode)");
                Ok((Arc::new(identity), Arc::new(store)))
            }
        }
    }

    /// Ensure all required directories exist
    async fn ensure_directories(config: &AppConfig) -> AppResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        if let Some(parent) = config.storage.cache_db.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// User id of the active session, or Authentication
    pub async fn require_user(&self) -> AppResult<String> {
        self.reconciler
            .current_user_id()
            .await
            .ok_or_else(|| AppError::Authentication("Not signed in".to_string()))
    }

    /// Whether the auth event listener and the transcript follower are still running
    pub fn is_listening(&self) -> bool {
        !self.listener.is_finished() && !self.follower.is_finished()
    }
}
