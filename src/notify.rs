/// User-facing notices (the toast queue)
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_PENDING: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Bounded queue of notices waiting to be shown; the oldest are dropped first
#[derive(Clone, Default)]
pub struct Notifier {
    pending: Arc<Mutex<VecDeque<Notice>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn info(&self, title: &str, description: &str) {
        self.push(NoticeLevel::Info, title, description).await;
    }

    pub async fn error(&self, title: &str, description: &str) {
        tracing::warn!("{}: {}", title, description);
        self.push(NoticeLevel::Error, title, description).await;
    }

    /// Take every pending notice
    pub async fn drain(&self) -> Vec<Notice> {
        self.pending.lock().await.drain(..).collect()
    }

    async fn push(&self, level: NoticeLevel, title: &str, description: &str) {
        let mut pending = self.pending.lock().await;
        if pending.len() == MAX_PENDING {
            pending.pop_front();
        }
        pending.push_back(Notice {
            level,
            title: title.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_empties_queue() {
        let notifier = Notifier::new();
        notifier.info("Signed in", "Welcome!").await;
        notifier.error("Save failed", "offline").await;

        let notices = notifier.drain().await;
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].level, NoticeLevel::Error);
        assert!(notifier.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_queue_is_bounded() {
        let notifier = Notifier::new();
        for i in 0..(MAX_PENDING + 5) {
            notifier.info(&format!("n{}", i), "").await;
        }

        let notices = notifier.drain().await;
        assert_eq!(notices.len(), MAX_PENDING);
        assert_eq!(notices[0].title, "n5");
    }
}
