/// Subscription endpoints
use crate::{
    context::AppContext,
    error::AppResult,
    store::{Plan, Subscription},
    subscription::SubscribeRequest,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Billing period used when the request does not give an end date
const DEFAULT_PERIOD_DAYS: i64 = 30;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/subscription", get(get_subscription).post(subscribe))
        .route("/api/subscription/cancel", post(cancel))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub plan: Plan,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_renew: bool,
}

async fn get_subscription(
    State(ctx): State<AppContext>,
) -> AppResult<Json<Option<Subscription>>> {
    let user_id = ctx.require_user().await?;
    Ok(Json(ctx.subscriptions.active(&user_id).await?))
}

async fn subscribe(
    State(ctx): State<AppContext>,
    Json(body): Json<SubscribeBody>,
) -> AppResult<Json<Subscription>> {
    let user_id = ctx.require_user().await?;

    let start_date = body.start_date.unwrap_or_else(Utc::now);
    let end_date = body
        .end_date
        .unwrap_or(start_date + Duration::days(DEFAULT_PERIOD_DAYS));

    let subscription = ctx
        .subscriptions
        .subscribe(SubscribeRequest {
            user_id,
            plan: body.plan,
            start_date,
            end_date,
            auto_renew: body.auto_renew,
        })
        .await?;

    ctx.notifier
        .info("Subscription updated", "Your plan is now active.")
        .await;
    Ok(Json(subscription))
}

async fn cancel(State(ctx): State<AppContext>) -> AppResult<Json<Subscription>> {
    let user_id = ctx.require_user().await?;
    let subscription = ctx.subscriptions.cancel(&user_id).await?;

    ctx.notifier
        .info("Subscription canceled", "You are back on the standard plan.")
        .await;
    Ok(Json(subscription))
}
