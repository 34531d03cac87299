/// Subscription Manager
///
/// Read-then-write upsert of the user's active subscription, followed by the
/// derived role on the profile. The two store writes are not atomic, and two
/// concurrent subscribes for one user can both insert.
use crate::{
    error::{AppError, AppResult},
    session::SessionReconciler,
    store::{Plan, RemoteStore, Role, Subscription, SubscriptionStatus},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub user_id: String,
    pub plan: Plan,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub auto_renew: bool,
}

pub struct SubscriptionManager {
    store: Arc<dyn RemoteStore>,
    reconciler: Arc<SessionReconciler>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn RemoteStore>, reconciler: Arc<SessionReconciler>) -> Self {
        Self { store, reconciler }
    }

    /// Current active subscription, if any
    pub async fn active(&self, user_id: &str) -> AppResult<Option<Subscription>> {
        self.store.find_active_subscription(user_id).await
    }

    /// Update the active subscription in place or insert a new one, then set the role
    pub async fn subscribe(&self, request: SubscribeRequest) -> AppResult<Subscription> {
        if request.user_id.trim().is_empty() {
            return Err(AppError::Validation("User id cannot be empty".to_string()));
        }
        if request.end_date <= request.start_date {
            return Err(AppError::Validation(
                "Subscription must end after it starts".to_string(),
            ));
        }

        let subscription = match self.store.find_active_subscription(&request.user_id).await? {
            Some(mut existing) => {
                existing.plan = request.plan;
                existing.start_date = request.start_date;
                existing.end_date = request.end_date;
                existing.auto_renew = request.auto_renew;
                self.store.update_subscription(&existing).await?;
                existing
            }
            None => {
                let created = Subscription {
                    id: Uuid::new_v4(),
                    user_id: request.user_id.clone(),
                    plan: request.plan,
                    status: SubscriptionStatus::Active,
                    start_date: request.start_date,
                    end_date: request.end_date,
                    auto_renew: request.auto_renew,
                };
                self.store.insert_subscription(&created).await?;
                created
            }
        };

        self.apply_role(&request.user_id, Role::from(request.plan)).await?;

        info!(
            "User {} subscribed to {:?} until {}",
            request.user_id, request.plan, request.end_date
        );
        Ok(subscription)
    }

    /// Cancel the active subscription and fall back to the standard role
    pub async fn cancel(&self, user_id: &str) -> AppResult<Subscription> {
        let mut subscription = self
            .store
            .find_active_subscription(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No active subscription for {}", user_id)))?;

        subscription.status = SubscriptionStatus::Canceled;
        subscription.auto_renew = false;
        self.store.update_subscription(&subscription).await?;

        self.apply_role(user_id, Role::Standard).await?;

        info!("Canceled subscription {} for {}", subscription.id, user_id);
        Ok(subscription)
    }

    async fn apply_role(&self, user_id: &str, role: Role) -> AppResult<()> {
        self.store.set_role(user_id, role).await?;
        self.reconciler
            .write_through(user_id, |profile| profile.role = role)
            .await?;
        Ok(())
    }
}
