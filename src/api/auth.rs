/// Sign-in, sign-up, sign-out and session endpoints
use crate::{
    context::AppContext,
    error::AppResult,
    identity::{AuthSession, Credentials, Registration},
    session::AuthState,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/logout", post(logout))
        .route("/api/session", get(get_session))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Session summary; tokens stay server-side
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl From<&AuthSession> for SessionInfo {
    fn from(session: &AuthSession) -> Self {
        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub session: Option<SessionInfo>,
    /// Account created but the provider wants the email confirmed first
    pub confirmation_required: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub state: AuthState,
    pub display_name: Option<String>,
    pub session: Option<SessionInfo>,
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<SessionInfo>> {
    let credentials = Credentials::new(&req.email, &req.password).checked()?;

    let session = ctx.identity.sign_in(&credentials).await?;
    // Signed in as soon as this returns; the profile fetch finishes in the background
    ctx.reconciler.resync(ctx.identity.as_ref()).await;
    tracing::info!("User {} signed in", session.user_id);
    ctx.notifier.info("Signed in", "Welcome back!").await;

    Ok(Json(SessionInfo::from(&session)))
}

async fn signup(
    State(ctx): State<AppContext>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Json<SignupResponse>> {
    let registration = Registration::new(&req.name, &req.email, &req.password).checked()?;

    let session = ctx.identity.sign_up(&registration).await?;
    let confirmation_required = session.is_none();
    if confirmation_required {
        ctx.notifier
            .info("Check your email", "Confirm your address to finish signing up.")
            .await;
    } else {
        ctx.reconciler.resync(ctx.identity.as_ref()).await;
        ctx.notifier.info("Account created", "You're signed in.").await;
    }

    Ok(Json(SignupResponse {
        session: session.as_ref().map(SessionInfo::from),
        confirmation_required,
    }))
}

async fn logout(State(ctx): State<AppContext>) -> AppResult<Json<AuthState>> {
    // The provider drops the local session even when the remote call fails
    let signed_out = ctx.identity.sign_out().await;
    ctx.chat.clear().await;
    let state = ctx.reconciler.reconcile(None).await?;

    match signed_out {
        Ok(()) => tracing::info!("Signed out"),
        Err(e) => {
            tracing::warn!("Signed out locally; remote logout failed: {}", e);
            ctx.notifier
                .error("Signed out", "The server did not confirm the logout.")
                .await;
        }
    }
    Ok(Json(state))
}

async fn get_session(State(ctx): State<AppContext>) -> Json<SessionResponse> {
    let state = ctx.reconciler.current().await;
    let session = ctx.identity.current_session().await;

    Json(SessionResponse {
        display_name: state.display_name().map(str::to_string),
        state,
        session: session.as_ref().map(SessionInfo::from),
    })
}
