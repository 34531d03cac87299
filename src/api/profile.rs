/// Profile endpoints
use crate::{
    context::AppContext,
    error::AppResult,
    store::{Profile, ProfileUpdate},
};
use axum::{extract::State, routing::get, Json, Router};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/profile", get(get_profile).put(update_profile))
}

/// Cached profile, or the remote row while the cache is still empty
async fn get_profile(State(ctx): State<AppContext>) -> AppResult<Json<Profile>> {
    let user_id = ctx.require_user().await?;

    if let Some(profile) = ctx.reconciler.current().await.profile() {
        return Ok(Json(profile.clone()));
    }

    let profile = ctx.store.fetch_profile(&user_id).await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<Profile>> {
    let user_id = ctx.require_user().await?;

    ctx.profiles.update(&user_id, update).await?;
    ctx.notifier
        .info("Profile updated", "Your changes have been saved.")
        .await;

    let profile = match ctx.reconciler.current().await.profile() {
        Some(profile) => profile.clone(),
        None => ctx.store.fetch_profile(&user_id).await?,
    };
    Ok(Json(profile))
}
