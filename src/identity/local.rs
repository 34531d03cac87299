/// Local identity provider - in-process accounts for development mode
use crate::{
    error::{AppError, AppResult},
    identity::{AuthEvent, AuthSession, Credentials, IdentityProvider, Registration, SessionHub, SharedToken},
    store::{MemoryStore, Profile, Role},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct LocalAccount {
    user_id: String,
    email: String,
    password: String,
}

/// Identity provider keeping accounts in memory
///
/// Sign-up also writes the profile row, as the hosted backend does on account creation.
#[derive(Clone)]
pub struct LocalIdentityProvider {
    accounts: Arc<RwLock<HashMap<String, LocalAccount>>>,
    profiles: MemoryStore,
    hub: SessionHub,
    session_ttl: Duration,
}

impl LocalIdentityProvider {
    pub fn new(profiles: MemoryStore) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            profiles,
            hub: SessionHub::new(),
            session_ttl: Duration::hours(1),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn token(&self) -> SharedToken {
        self.hub.token()
    }

    fn issue(&self, account: &LocalAccount) -> AuthSession {
        AuthSession {
            user_id: account.user_id.clone(),
            email: Some(account.email.clone()),
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + self.session_ttl,
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, credentials: &Credentials) -> AppResult<AuthSession> {
        let credentials = credentials.clone().checked()?;
        let key = credentials.email.to_lowercase();

        let account = self
            .accounts
            .read()
            .await
            .get(&key)
            .filter(|a| a.password == credentials.password)
            .cloned()
            .ok_or_else(|| AppError::Authentication("Invalid login credentials".to_string()))?;

        let session = self.issue(&account);
        self.hub.establish(session.clone(), false).await;
        Ok(session)
    }

    async fn sign_up(&self, registration: &Registration) -> AppResult<Option<AuthSession>> {
        let registration = registration.clone().checked()?;
        let key = registration.email.to_lowercase();

        let account = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
            let account = LocalAccount {
                user_id: Uuid::new_v4().to_string(),
                email: registration.email.clone(),
                password: registration.password.clone(),
            };
            accounts.insert(key, account.clone());
            account
        };

        self.profiles
            .put_profile(Profile {
                id: account.user_id.clone(),
                name: Some(registration.name.clone()),
                role: Role::Standard,
                avatar_url: None,
                email: Some(account.email.clone()),
            })
            .await;

        let session = self.issue(&account);
        self.hub.establish(session.clone(), false).await;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> AppResult<()> {
        self.hub.clear().await;
        Ok(())
    }

    async fn refresh(&self) -> AppResult<AuthSession> {
        let mut session = self
            .hub
            .current()
            .await
            .ok_or_else(|| AppError::Authentication("No session to refresh".to_string()))?;

        session.access_token = Uuid::new_v4().to_string();
        session.refresh_token = Uuid::new_v4().to_string();
        session.expires_at = Utc::now() + self.session_ttl;

        self.hub.establish(session.clone(), true).await;
        Ok(session)
    }

    async fn current_session(&self) -> Option<AuthSession> {
        self.hub.current().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.hub.subscribe()
    }
}
