/// Query Recorder - best-effort append of chat exchanges
use crate::{
    notify::Notifier,
    store::{QueryRecord, RemoteStore},
};
use std::sync::Arc;
use tracing::{debug, info};

/// What happened to one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// No known user
    Skipped,
    Failed(String),
}

#[derive(Clone)]
pub struct QueryRecorder {
    store: Arc<dyn RemoteStore>,
    notifier: Notifier,
}

impl QueryRecorder {
    pub fn new(store: Arc<dyn RemoteStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Append one record. Never raises; a failure becomes an error notice.
    pub async fn record(&self, user_id: Option<&str>, query: &str, response: &str) -> RecordOutcome {
        let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
            debug!("No user for this exchange, not recording");
            return RecordOutcome::Skipped;
        };

        let record = QueryRecord::new(user_id, query, response);
        match self.store.insert_query(&record).await {
            Ok(()) => {
                info!("Recorded query for {}", user_id);
                RecordOutcome::Recorded
            }
            Err(e) => {
                let message = e.to_string();
                self.notifier
                    .error("Could not save your query", &message)
                    .await;
                RecordOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{AppError, AppResult},
        notify::NoticeLevel,
        store::{MemoryStore, Profile, ProfileUpdate, Role, Subscription},
    };
    use async_trait::async_trait;

    /// Store whose writes always fail
    struct Offline;

    #[async_trait]
    impl RemoteStore for Offline {
        async fn fetch_profile(&self, user_id: &str) -> AppResult<Profile> {
            Err(AppError::NotFound(user_id.to_string()))
        }
        async fn update_profile(&self, _: &str, _: &ProfileUpdate) -> AppResult<()> {
            Err(AppError::Remote("offline".to_string()))
        }
        async fn set_role(&self, _: &str, _: Role) -> AppResult<()> {
            Err(AppError::Remote("offline".to_string()))
        }
        async fn insert_query(&self, _: &QueryRecord) -> AppResult<()> {
            Err(AppError::Remote("offline".to_string()))
        }
        async fn list_queries(&self, _: &str) -> AppResult<Vec<QueryRecord>> {
            Ok(Vec::new())
        }
        async fn find_active_subscription(&self, _: &str) -> AppResult<Option<Subscription>> {
            Ok(None)
        }
        async fn insert_subscription(&self, _: &Subscription) -> AppResult<()> {
            Err(AppError::Remote("offline".to_string()))
        }
        async fn update_subscription(&self, _: &Subscription) -> AppResult<()> {
            Err(AppError::Remote("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_known_user_writes_one_record() {
        let store = MemoryStore::new();
        let recorder = QueryRecorder::new(Arc::new(store.clone()), Notifier::new());

        let outcome = recorder.record(Some("u1"), "q", "a").await;
        assert_eq!(outcome, RecordOutcome::Recorded);

        let rows = store.queries().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "u1");
        assert_eq!(rows[0].query, "q");
        assert_eq!(rows[0].response, "a");
    }

    #[tokio::test]
    async fn test_no_user_writes_nothing() {
        let store = MemoryStore::new();
        let recorder = QueryRecorder::new(Arc::new(store.clone()), Notifier::new());

        assert_eq!(recorder.record(None, "q", "a").await, RecordOutcome::Skipped);
        assert_eq!(recorder.record(Some(""), "q", "a").await, RecordOutcome::Skipped);
        assert!(store.queries().await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_becomes_notice() {
        let notifier = Notifier::new();
        let recorder = QueryRecorder::new(Arc::new(Offline), notifier.clone());

        let outcome = recorder.record(Some("u1"), "q", "a").await;
        assert!(matches!(outcome, RecordOutcome::Failed(ref m) if m.contains("offline")));

        let notices = notifier.drain().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }
}
