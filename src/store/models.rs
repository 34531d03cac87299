/// Row models shared by the remote store, the session cache and the API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name used when the profile has not been loaded
pub const PLACEHOLDER_NAME: &str = "User";

/// Tier label controlling feature access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Standard,
    Pro,
    FreeAccess,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Pro => "pro",
            Role::FreeAccess => "free_access",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Standard
    }
}

/// User profile, canonical in the remote store and denormalized in the session cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Profile {
    /// Name for display, falling back to the placeholder
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => PLACEHOLDER_NAME,
        }
    }
}

/// Editable profile fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One completed chat exchange; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub user_id: String,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl QueryRecord {
    pub fn new(user_id: &str, query: &str, response: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            query: query.to_string(),
            response: response.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Subscribable plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Standard,
    Pro,
}

impl From<Plan> for Role {
    fn from(plan: Plan) -> Self {
        match plan {
            Plan::Standard => Role::Standard,
            Plan::Pro => Role::Pro,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Expired,
}

/// Subscription record; at most one active per user (not enforced by the store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
}
