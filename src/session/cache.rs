/// Session Cache - durable single-slot store for the signed-in user's profile
use crate::{
    error::{AppError, AppResult},
    store::Profile,
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Fixed key of the only slot
pub const CURRENT_USER_KEY: &str = "current_user";

/// Session cache backed by the local SQLite database
#[derive(Clone)]
pub struct SessionCache {
    db: SqlitePool,
}

impl SessionCache {
    /// Create a new session cache
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Get the cached profile
    ///
    /// A value that no longer decodes is dropped and reported as empty.
    pub async fn load(&self) -> AppResult<Option<Profile>> {
        let result = sqlx::query("SELECT value FROM local_cache WHERE key = ?1")
            .bind(CURRENT_USER_KEY)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::Database)?;

        let Some(row) = result else {
            return Ok(None);
        };

        let value: String = row.try_get("value")?;
        match serde_json::from_str::<Profile>(&value) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!("Discarding unreadable cached profile: {}", e);
                self.clear().await?;
                Ok(None)
            }
        }
    }

    /// Overwrite the slot
    pub async fn store(&self, profile: &Profile) -> AppResult<()> {
        let value = serde_json::to_string(profile)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO local_cache (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(CURRENT_USER_KEY)
        .bind(&value)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Empty the slot
    pub async fn clear(&self) -> AppResult<()> {
        sqlx::query("DELETE FROM local_cache WHERE key = ?1")
            .bind(CURRENT_USER_KEY)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
