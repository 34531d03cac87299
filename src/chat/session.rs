/// Chat transcript and submission flow
use crate::{
    chat::{ChatGateway, QueryRecorder, RecordOutcome},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            created_at: Utc::now(),
        }
    }
}

/// Result of one submission
#[derive(Debug, Clone, Serialize)]
pub struct ChatExchange {
    pub question: ChatMessage,
    pub answer: ChatMessage,
    /// False when the answer is a rendered failure
    pub answered: bool,
    #[serde(skip)]
    pub record: RecordOutcome,
}

/// Clears the in-flight flag when the submission ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Messages and the user they belong to (None for an anonymous chat)
#[derive(Default)]
struct Transcript {
    owner: Option<String>,
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Hand the transcript to `user_id`; another user's messages are dropped
    fn adopt(&mut self, user_id: Option<&str>) {
        if self.owner.is_some() && self.owner.as_deref() != user_id {
            self.messages.clear();
        }
        self.owner = user_id.map(str::to_string);
    }

    fn visible_to(&self, user_id: Option<&str>) -> bool {
        self.owner.is_none() || self.owner.as_deref() == user_id
    }
}

pub struct ChatSession {
    gateway: ChatGateway,
    recorder: QueryRecorder,
    transcript: RwLock<Transcript>,
    in_flight: AtomicBool,
}

impl ChatSession {
    pub fn new(gateway: ChatGateway, recorder: QueryRecorder) -> Self {
        Self {
            gateway,
            recorder,
            transcript: RwLock::new(Transcript::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Submit one query
    ///
    /// Blank input is ignored. Only one submission may be in flight at a time.
    pub async fn submit(&self, input: &str, user_id: Option<&str>) -> AppResult<Option<ChatExchange>> {
        let query = input.trim();
        if query.is_empty() {
            return Ok(None);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::Conflict(
                "A query is already being answered".to_string(),
            ));
        }
        let _guard = InFlight(&self.in_flight);

        let question = ChatMessage::new(ChatRole::User, query.to_string());
        {
            let mut transcript = self.transcript.write().await;
            transcript.adopt(user_id);
            transcript.messages.push(question.clone());
        }

        let (content, answered) = match self.gateway.reply(query).await {
            Ok(text) => (text, true),
            Err(shown) => (shown, false),
        };

        let answer = ChatMessage::new(ChatRole::Assistant, content);
        {
            let mut transcript = self.transcript.write().await;
            // Signed out or switched user while waiting
            if transcript.owner.as_deref() == user_id {
                transcript.messages.push(answer.clone());
            }
        }

        let record = if answered {
            self.recorder.record(user_id, query, &answer.content).await
        } else {
            RecordOutcome::Skipped
        };

        Ok(Some(ChatExchange {
            question,
            answer,
            answered,
            record,
        }))
    }

    /// Messages visible to `user_id`
    pub async fn transcript(&self, user_id: Option<&str>) -> Vec<ChatMessage> {
        let transcript = self.transcript.read().await;
        if transcript.visible_to(user_id) {
            transcript.messages.clone()
        } else {
            Vec::new()
        }
    }

    /// Drop the transcript, e.g. on logout
    pub async fn clear(&self) {
        let mut transcript = self.transcript.write().await;
        transcript.owner = None;
        transcript.messages.clear();
    }

    /// Drop the transcript if it still belongs to `user_id`
    pub async fn release(&self, user_id: &str) {
        let mut transcript = self.transcript.write().await;
        if transcript.owner.as_deref() == Some(user_id) {
            transcript.owner = None;
            transcript.messages.clear();
            debug!("Cleared transcript of {}", user_id);
        }
    }

    /// Release each user's transcript as soon as they stop being the signed-in user
    pub fn follow_user(self: &Arc<Self>, mut users: watch::Receiver<Option<String>>) -> JoinHandle<()> {
        let chat = Arc::clone(self);
        tokio::spawn(async move {
            let mut previous = users.borrow_and_update().clone();
            while users.changed().await.is_ok() {
                let current = users.borrow_and_update().clone();
                if let Some(gone) = previous.as_deref().filter(|p| Some(*p) != current.as_deref()) {
                    chat.release(gone).await;
                }
                previous = current;
            }
        })
    }
}
