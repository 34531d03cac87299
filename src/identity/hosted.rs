/// Hosted identity provider - GoTrue-style token endpoints over HTTP
use crate::{
    error::{AppError, AppResult},
    identity::{AuthEvent, AuthSession, Credentials, IdentityProvider, Registration, SessionHub, SharedToken},
};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

/// Hosted identity configuration
#[derive(Debug, Clone)]
pub struct HostedIdentityConfig {
    /// e.g. https://xyz.supabase.co/auth/v1
    pub base_url: String,
    pub anon_key: String,
    pub user_agent: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: ProviderUser,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_code: Option<String>,
}

impl ProviderErrorBody {
    fn text(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
    }
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in.unwrap_or(3600)));

        AuthSession {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Identity provider backed by the hosted service
#[derive(Clone)]
pub struct HostedIdentityProvider {
    http_client: reqwest::Client,
    config: HostedIdentityConfig,
    hub: SessionHub,
}

impl HostedIdentityProvider {
    /// Create a new hosted identity provider
    pub fn new(config: HostedIdentityConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            hub: SessionHub::new(),
        })
    }

    /// Token handle for the REST store
    pub fn token(&self) -> SharedToken {
        self.hub.token()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST to the token endpoint and decode the session
    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> AppResult<AuthSession> {
        let response = self
            .http_client
            .post(self.url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Remote(format!("Identity request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => AppError::Authentication(
                    body.text()
                        .unwrap_or_else(|| "Invalid login credentials".to_string()),
                ),
                _ => AppError::Remote(format!(
                    "Identity provider returned HTTP {}: {}",
                    status.as_u16(),
                    body.text().unwrap_or_default()
                )),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Invalid token response: {}", e)))?;

        Ok(token.into_session())
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn sign_in(&self, credentials: &Credentials) -> AppResult<AuthSession> {
        let credentials = credentials.clone().checked()?;

        let session = self
            .grant(
                "password",
                json!({ "email": credentials.email, "password": credentials.password }),
            )
            .await?;

        tracing::info!("Signed in user {}", session.user_id);
        self.hub.establish(session.clone(), false).await;
        Ok(session)
    }

    async fn sign_up(&self, registration: &Registration) -> AppResult<Option<AuthSession>> {
        let registration = registration.clone().checked()?;

        let response = self
            .http_client
            .post(self.url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({
                "email": registration.email,
                "password": registration.password,
                "data": { "name": registration.name },
            }))
            .send()
            .await
            .map_err(|e| AppError::Remote(format!("Identity request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            let text = body.text().unwrap_or_default();
            let duplicate = body.error_code.as_deref() == Some("user_already_exists")
                || text.to_lowercase().contains("already registered");
            return Err(if duplicate {
                AppError::Conflict("Email already registered".to_string())
            } else if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
                AppError::Validation(text)
            } else {
                AppError::Remote(format!(
                    "Identity provider returned HTTP {}: {}",
                    status.as_u16(),
                    text
                ))
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Invalid sign-up response: {}", e)))?;

        // Without an access token the account is waiting for email confirmation
        if body.get("access_token").is_none() {
            tracing::info!("Sign-up for {} awaits email confirmation", registration.email);
            return Ok(None);
        }

        let token: TokenResponse = serde_json::from_value(body)?;
        let session = token.into_session();
        self.hub.establish(session.clone(), false).await;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> AppResult<()> {
        let token = self.hub.token().read().await.clone();

        let remote = match token {
            Some(token) => self
                .http_client
                .post(self.url("logout"))
                .header("apikey", &self.config.anon_key)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| AppError::Remote(format!("Logout request failed: {}", e)))
                .and_then(|response| {
                    let status = response.status();
                    if status.is_success() {
                        Ok(())
                    } else {
                        Err(AppError::Remote(format!("Logout returned {}", status)))
                    }
                }),
            None => Ok(()),
        };

        self.hub.clear().await;

        if let Err(ref e) = remote {
            tracing::warn!("Remote sign-out failed, local session cleared anyway: {}", e);
        }
        remote
    }

    async fn refresh(&self) -> AppResult<AuthSession> {
        let current = self
            .hub
            .current()
            .await
            .ok_or_else(|| AppError::Authentication("No session to refresh".to_string()))?;

        let session = self
            .grant(
                "refresh_token",
                json!({ "refresh_token": current.refresh_token }),
            )
            .await?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode as AxumStatus, routing::post, Json, Router};
    use std::collections::HashMap;

    async fn token(
        Query(params): Query<HashMap<String, String>>,
        Json(body): Json<serde_json::Value>,
    ) -> (AxumStatus, Json<serde_json::Value>) {
        let grant = params.get("grant_type").map(String::as_str);
        match grant {
            Some("password") if body["password"] == "correct-horse" => (
                AxumStatus::OK,
                Json(json!({
                    "access_token": "at-1",
                    "refresh_token": "rt-1",
                    "expires_in": 3600,
                    "user": { "id": "u1", "email": "ivan@example.com" }
                })),
            ),
            Some("refresh_token") if body["refresh_token"] == "rt-1" => (
                AxumStatus::OK,
                Json(json!({
                    "access_token": "at-2",
                    "refresh_token": "rt-2",
                    "expires_in": 3600,
                    "user": { "id": "u1", "email": "ivan@example.com" }
                })),
            ),
            _ => (
                AxumStatus::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid login credentials"
                })),
            ),
        }
    }

    async fn signup(Json(body): Json<serde_json::Value>) -> (AxumStatus, Json<serde_json::Value>) {
        if body["email"] == "taken@example.com" {
            return (
                AxumStatus::UNPROCESSABLE_ENTITY,
                Json(json!({ "error_code": "user_already_exists", "msg": "User already registered" })),
            );
        }
        (AxumStatus::OK, Json(json!({ "id": "u2", "email": body["email"] })))
    }

    async fn provider() -> HostedIdentityProvider {
        provider_with_logout(AxumStatus::NO_CONTENT).await
    }

    async fn provider_with_logout(logout: AxumStatus) -> HostedIdentityProvider {
        let router = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/signup", post(signup))
            .route("/auth/v1/logout", post(move || async move { logout }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        HostedIdentityProvider::new(HostedIdentityConfig {
            base_url: format!("http://{}/auth/v1", addr),
            anon_key: "anon-key".to_string(),
            user_agent: "RAGent/test".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_refresh_sign_out() {
        let provider = provider().await;
        let mut events = provider.subscribe();

        let session = provider
            .sign_in(&Credentials::new("ivan@example.com", "correct-horse"))
            .await
            .unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(provider.token().read().await.as_deref(), Some("at-1"));
        assert_eq!(events.recv().await.unwrap().kind(), "SIGNED_IN");

        let refreshed = provider.refresh().await.unwrap();
        assert_eq!(refreshed.access_token, "at-2");
        assert_eq!(events.recv().await.unwrap().kind(), "TOKEN_REFRESHED");

        provider.sign_out().await.unwrap();
        assert!(provider.current_session().await.is_none());
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let provider = provider().await;
        let err = provider
            .sign_in(&Credentials::new("ivan@example.com", "wrong"))
            .await
            .unwrap_err();
        match err {
            AppError::Authentication(message) => assert_eq!(message, "Invalid login credentials"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(provider.current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_and_duplicate() {
        let provider = provider().await;

        let pending = provider
            .sign_up(&Registration::new("Olena", "olena@example.com", "123456"))
            .await
            .unwrap();
        assert!(pending.is_none());

        let err = provider
            .sign_up(&Registration::new("Olena", "taken@example.com", "123456"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rejected_logout_still_clears_local_session() {
        let provider = provider_with_logout(AxumStatus::INTERNAL_SERVER_ERROR).await;
        let mut events = provider.subscribe();

        provider
            .sign_in(&Credentials::new("ivan@example.com", "correct-horse"))
            .await
            .unwrap();
        assert_eq!(events.recv().await.unwrap().kind(), "SIGNED_IN");

        let err = provider.sign_out().await.unwrap_err();
        assert!(matches!(err, AppError::Remote(_)));
        assert!(provider.current_session().await.is_none());
        assert!(provider.token().read().await.is_none());
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    }
}
