/// Identity provider adapters
///
/// Thin clients over the hosted identity service. The application only reads
/// the user identifier and expiry from a session; everything else stays opaque.

pub mod hosted;
pub mod local;

pub use hosted::{HostedIdentityConfig, HostedIdentityProvider};
pub use local::LocalIdentityProvider;

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use validator::{Validate, ValidationErrors};

/// Access token shared with clients that call the backend on the user's behalf
pub type SharedToken = Arc<RwLock<Option<String>>>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Provider-issued session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// True when the session expires within `margin`
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at - Utc::now() <= margin
    }
}

/// Session-state transition
#[derive(Debug, Clone)]
pub enum AuthEvent {
    InitialSession(Option<AuthSession>),
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

impl AuthEvent {
    /// Session carried by the event, if any
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthEvent::InitialSession(session) => session.as_ref(),
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::InitialSession(_) => "INITIAL_SESSION",
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::SignedOut => "SIGNED_OUT",
        }
    }
}

/// Login form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    /// Trim and validate
    pub fn checked(self) -> AppResult<Self> {
        let form = Self::new(&self.email, &self.password);
        form.validate().map_err(validation_error)?;
        Ok(form)
    }
}

/// Sign-up form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

impl Registration {
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    /// Trim and validate
    pub fn checked(self) -> AppResult<Self> {
        let form = Self::new(&self.name, &self.email, &self.password);
        form.validate().map_err(validation_error)?;
        Ok(form)
    }
}

fn validation_error(errors: ValidationErrors) -> AppError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
                .collect::<Vec<_>>()
        })
        .collect();
    messages.sort();
    AppError::Validation(messages.join("; "))
}

/// Operations the application needs from the identity service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> AppResult<AuthSession>;

    /// None when the account awaits email confirmation
    async fn sign_up(&self, registration: &Registration) -> AppResult<Option<AuthSession>>;

    /// Always drops the local session, even if the remote call fails
    async fn sign_out(&self) -> AppResult<()>;

    async fn refresh(&self) -> AppResult<AuthSession>;

    async fn current_session(&self) -> Option<AuthSession>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Current session plus the event channel, shared by provider implementations
#[derive(Clone)]
pub struct SessionHub {
    current: Arc<RwLock<Option<AuthSession>>>,
    token: SharedToken,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            current: Arc::new(RwLock::new(None)),
            token: Arc::new(RwLock::new(None)),
            events,
        }
    }

    pub fn token(&self) -> SharedToken {
        Arc::clone(&self.token)
    }

    pub async fn current(&self) -> Option<AuthSession> {
        self.current.read().await.clone()
    }

    /// Store a new session and announce it
    pub async fn establish(&self, session: AuthSession, refreshed: bool) {
        *self.token.write().await = Some(session.access_token.clone());
        *self.current.write().await = Some(session.clone());

        let event = if refreshed {
            AuthEvent::TokenRefreshed(session)
        } else {
            AuthEvent::SignedIn(session)
        };
        self.emit(event);
    }

    /// Drop the session and announce the sign-out
    pub async fn clear(&self) {
        *self.token.write().await = None;
        *self.current.write().await = None;
        self.emit(AuthEvent::SignedOut);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AuthEvent) {
        tracing::debug!("Auth event: {}", event.kind());
        // No receivers is fine; nobody is listening yet
        let _ = self.events.send(event);
    }
}
