/// REST store - row access over the hosted backend's PostgREST endpoints
use crate::{
    error::{AppError, AppResult},
    identity::SharedToken,
    store::{Profile, ProfileUpdate, QueryRecord, RemoteStore, Role, Subscription},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

const PROFILE_COLUMNS: &str = "id,name,role,avatar_url,email";
const QUERY_COLUMNS: &str = "user_id,query,response,created_at";
const SUBSCRIPTION_COLUMNS: &str = "id,user_id,plan,status,start_date,end_date,auto_renew";

/// REST store configuration
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// e.g. https://xyz.supabase.co/rest/v1
    pub base_url: String,
    pub anon_key: String,
    pub user_agent: String,
}

/// Store backed by the hosted REST API
#[derive(Clone)]
pub struct RestStore {
    http_client: reqwest::Client,
    config: RestStoreConfig,
    access_token: SharedToken,
}

impl RestStore {
    /// Create a new REST store; requests carry the signed-in user's token when present
    pub fn new(config: RestStoreConfig, access_token: SharedToken) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            access_token,
        })
    }

    async fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), table);
        let bearer = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.config.anon_key.clone());

        self.http_client
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, table: &str, request: RequestBuilder) -> AppResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Remote(format!("{} request failed: {}", table, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote(format!(
                "{} returned HTTP {}: {}",
                table,
                status.as_u16(),
                body
            )));
        }

        Ok(response)
    }

    async fn rows<T: DeserializeOwned>(&self, table: &str, request: RequestBuilder) -> AppResult<Vec<T>> {
        self.send(table, request)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Invalid {} rows: {}", table, e)))
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn fetch_profile(&self, user_id: &str) -> AppResult<Profile> {
        let request = self
            .request(Method::GET, "profiles")
            .await
            .query(&[("select", PROFILE_COLUMNS.to_string()), ("id", format!("eq.{}", user_id))]);

        let mut rows: Vec<Profile> = self.rows("profiles", request).await?;
        match rows.len() {
            0 => Err(AppError::NotFound(format!("Profile {} not found", user_id))),
            1 => Ok(rows.remove(0)),
            n => Err(AppError::Remote(format!(
                "Expected one profile for {}, got {}",
                user_id, n
            ))),
        }
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> AppResult<()> {
        let request = self
            .request(Method::PATCH, "profiles")
            .await
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({
                "name": update.name,
                "avatar_url": update.avatar_url,
                "updated_at": Utc::now().to_rfc3339(),
            }));

        self.send("profiles", request).await?;
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: Role) -> AppResult<()> {
        let request = self
            .request(Method::PATCH, "profiles")
            .await
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({
                "role": role,
                "updated_at": Utc::now().to_rfc3339(),
            }));

        self.send("profiles", request).await?;
        Ok(())
    }

    async fn insert_query(&self, record: &QueryRecord) -> AppResult<()> {
        let request = self
            .request(Method::POST, "queries")
            .await
            .header("Prefer", "return=minimal")
            .json(record);

        self.send("queries", request).await?;
        Ok(())
    }

    async fn list_queries(&self, user_id: &str) -> AppResult<Vec<QueryRecord>> {
        let request = self.request(Method::GET, "queries").await.query(&[
            ("select", QUERY_COLUMNS.to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
        ]);

        self.rows("queries", request).await
    }

    async fn find_active_subscription(&self, user_id: &str) -> AppResult<Option<Subscription>> {
        let request = self.request(Method::GET, "subscriptions").await.query(&[
            ("select", SUBSCRIPTION_COLUMNS.to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("status", "eq.active".to_string()),
            ("limit", "1".to_string()),
        ]);

        let rows: Vec<Subscription> = self.rows("subscriptions", request).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> AppResult<()> {
        let request = self
            .request(Method::POST, "subscriptions")
            .await
            .header("Prefer", "return=minimal")
            .json(subscription);

        self.send("subscriptions", request).await?;
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> AppResult<()> {
        let request = self
            .request(Method::PATCH, "subscriptions")
            .await
            .query(&[("id", format!("eq.{}", subscription.id))])
            .header("Prefer", "return=minimal")
            .json(&json!({
                "plan": subscription.plan,
                "status": subscription.status,
                "start_date": subscription.start_date,
                "end_date": subscription.end_date,
                "auto_renew": subscription.auto_renew,
            }));

        self.send("subscriptions", request).await?;
        Ok(())
    }
}
