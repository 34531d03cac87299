/// Session Reconciler - keeps the session cache in step with auth transitions
use crate::{
    error::AppResult,
    identity::{AuthEvent, AuthSession, IdentityProvider},
    profile::ProfileFetcher,
    session::{AuthState, SessionCache},
    store::Profile,
};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct Tracked {
    state: AuthState,
    /// Bumped on every transition; fetches started under an older epoch are dropped
    epoch: u64,
}

/// A profile fetch decided by a transition, not yet performed
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetch {
    pub user_id: String,
    epoch: u64,
}

/// Owner of the session cache and of the current auth state
pub struct SessionReconciler {
    cache: SessionCache,
    fetcher: ProfileFetcher,
    tracked: Mutex<Tracked>,
    /// User id of the current state, for services that reset on sign-out
    user: watch::Sender<Option<String>>,
}

impl SessionReconciler {
    pub fn new(cache: SessionCache, fetcher: ProfileFetcher) -> Self {
        Self {
            cache,
            fetcher,
            tracked: Mutex::new(Tracked {
                state: AuthState::LoggedOut,
                epoch: 0,
            }),
            user: watch::channel(None).0,
        }
    }

    /// Follow the current user id
    pub fn watch_user(&self) -> watch::Receiver<Option<String>> {
        self.user.subscribe()
    }

    /// Current auth state
    pub async fn current(&self) -> AuthState {
        self.tracked.lock().await.state.clone()
    }

    pub async fn current_user_id(&self) -> Option<String> {
        self.tracked
            .lock()
            .await
            .state
            .user_id()
            .map(str::to_string)
    }

    /// Profile in the durable cache
    pub async fn cached_profile(&self) -> AppResult<Option<Profile>> {
        self.cache.load().await
    }

    /// Apply a transition and fetch the profile if needed, waiting for the result
    pub async fn reconcile(&self, session: Option<&AuthSession>) -> AppResult<AuthState> {
        match self.begin(session).await? {
            Some(pending) => Ok(self.complete(pending).await),
            None => Ok(self.current().await),
        }
    }

    /// Apply a transition to the state and cache
    ///
    /// Returns the fetch to perform when the cache does not hold the session's user.
    pub async fn begin(&self, session: Option<&AuthSession>) -> AppResult<Option<PendingFetch>> {
        let mut tracked = self.tracked.lock().await;
        tracked.epoch += 1;

        let Some(session) = session else {
            tracked.state = AuthState::LoggedOut;
            self.publish_user(None);
            self.cache.clear().await?;
            debug!("No session, cache cleared");
            return Ok(None);
        };

        let user_id = session.user_id.clone();
        self.publish_user(Some(&user_id));

        let cached = match self.cache.load().await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Failed to read session cache: {}", e);
                None
            }
        };

        if let Some(profile) = cached {
            if profile.id == user_id {
                debug!("Cached profile matches session user {}", user_id);
                tracked.state = AuthState::Authenticated {
                    user_id,
                    profile: Some(profile),
                };
                return Ok(None);
            }

            info!("Cached profile {} does not match session user {}", profile.id, user_id);
            // The state must not keep the previous user's profile, whatever the clear does
            tracked.state = AuthState::Authenticated {
                user_id: user_id.clone(),
                profile: None,
            };
            if let Err(e) = self.cache.clear().await {
                error!("Failed to clear session cache: {}", e);
            }
        } else {
            tracked.state = AuthState::Authenticated {
                user_id: user_id.clone(),
                profile: None,
            };
        }

        Ok(Some(PendingFetch {
            user_id,
            epoch: tracked.epoch,
        }))
    }

    /// Perform a pending fetch and apply it if the session has not moved on
    pub async fn complete(&self, pending: PendingFetch) -> AuthState {
        let profile = match self.fetcher.fetch(&pending.user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                error!("Failed to fetch profile for {}: {}", pending.user_id, e);
                return self.current().await;
            }
        };

        let mut tracked = self.tracked.lock().await;
        let outdated = tracked.epoch != pending.epoch
            || tracked.state.user_id() != Some(pending.user_id.as_str());
        if outdated {
            debug!("Discarding profile fetched for an outdated session");
            return tracked.state.clone();
        }

        if let Err(e) = self.cache.store(&profile).await {
            error!("Failed to write session cache: {}", e);
        }
        tracked.state = AuthState::Authenticated {
            user_id: pending.user_id,
            profile: Some(profile),
        };
        tracked.state.clone()
    }

    /// Update the cached profile after a change was written to the remote store
    ///
    /// Only touches the cache when it holds `user_id`'s profile. Returns whether it did.
    pub async fn write_through<F>(&self, user_id: &str, apply: F) -> AppResult<bool>
    where
        F: FnOnce(&mut Profile),
    {
        let mut tracked = self.tracked.lock().await;
        let AuthState::Authenticated {
            user_id: current,
            profile: Some(profile),
        } = &mut tracked.state
        else {
            return Ok(false);
        };
        if current.as_str() != user_id {
            return Ok(false);
        }

        apply(profile);
        self.cache.store(profile).await?;
        Ok(true)
    }

    /// Apply a transition now and run its fetch on its own task
    pub async fn apply(
        self: &Arc<Self>,
        session: Option<&AuthSession>,
    ) -> AppResult<Option<JoinHandle<AuthState>>> {
        Ok(self.begin(session).await?.map(|pending| {
            let reconciler = Arc::clone(self);
            tokio::spawn(async move { reconciler.complete(pending).await })
        }))
    }

    /// Handle one event with the session it carries
    pub async fn handle_event(self: &Arc<Self>, event: AuthEvent) -> Option<JoinHandle<AuthState>> {
        debug!("Reconciling after {}", event.kind());
        match self.apply(event.session()).await {
            Ok(fetch) => fetch,
            Err(e) => {
                error!("Failed to reconcile session after {}: {}", event.kind(), e);
                None
            }
        }
    }

    /// Reconcile against the provider's current session
    ///
    /// Used for every event the listener sees, so a late event can never roll
    /// the state back to a session the provider no longer holds.
    pub async fn resync(
        self: &Arc<Self>,
        identity: &dyn IdentityProvider,
    ) -> Option<JoinHandle<AuthState>> {
        let session = identity.current_session().await;
        match self.apply(session.as_ref()).await {
            Ok(fetch) => fetch,
            Err(e) => {
                error!("Failed to reconcile session: {}", e);
                None
            }
        }
    }

    /// Follow the provider's events until its channel closes
    pub fn listen(self: &Arc<Self>, identity: Arc<dyn IdentityProvider>) -> JoinHandle<()> {
        let mut events = identity.subscribe();
        let reconciler = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!("Auth event {}", event.kind());
                        reconciler.resync(identity.as_ref()).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} auth events, resynchronizing", skipped);
                        reconciler.resync(identity.as_ref()).await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Auth event channel closed");
                        break;
                    }
                }
            }
        })
    }

    fn publish_user(&self, user_id: Option<&str>) {
        self.user.send_if_modified(|current| {
            if current.as_deref() == user_id {
                return false;
            }
            *current = user_id.map(str::to_string);
            true
        });
    }
}
