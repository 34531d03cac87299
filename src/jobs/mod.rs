use crate::{context::AppContext, error::AppResult, identity::IdentityProvider};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// How often the session is checked
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Sessions expiring within this margin are refreshed
const REFRESH_MARGIN_SECS: i64 = 300;

/// What the session check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    NoSession,
    Valid,
    Refreshed,
    /// Refresh failed but the token is still usable
    RefreshFailed,
    /// Refresh failed after expiry
    SignedOut,
}

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::session_refresh_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Keep the session fresh (runs every minute)
    async fn session_refresh_job(scheduler: Arc<Self>) {
        let mut interval = interval(SESSION_CHECK_INTERVAL);

        loop {
            interval.tick().await;

            match check_session(scheduler.context.identity.as_ref()).await {
                Ok(SessionCheck::Refreshed) => info!("Session refreshed"),
                Ok(SessionCheck::SignedOut) => info!("Session expired, signed out"),
                Ok(outcome) => debug!("Session check: {:?}", outcome),
                Err(e) => error!("Session check failed: {}", e),
            }
        }
    }
}

/// Refresh a session that is about to expire; sign out one that already has
pub async fn check_session(identity: &dyn IdentityProvider) -> AppResult<SessionCheck> {
    let Some(session) = identity.current_session().await else {
        return Ok(SessionCheck::NoSession);
    };

    if !session.expires_within(ChronoDuration::seconds(REFRESH_MARGIN_SECS)) {
        return Ok(SessionCheck::Valid);
    }

    match identity.refresh().await {
        Ok(_) => Ok(SessionCheck::Refreshed),
        Err(e) if session.is_expired() => {
            warn!("Failed to refresh expired session: {}", e);
            identity.sign_out().await?;
            Ok(SessionCheck::SignedOut)
        }
        Err(e) => {
            warn!("Failed to refresh session, will retry: {}", e);
            Ok(SessionCheck::RefreshFailed)
        }
    }
}
