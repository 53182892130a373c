//! Per-user chat sessions stored as one JSON file per user

use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{ChatMessage, ChatSession, NewMessage, UserChats};

use super::{read_json, write_json_atomic};

/// Chat history under `storage_dir/{user_id}_chats.json`
///
/// Every write rewrites the user's whole file while holding that user's lock.
pub struct ChatHistoryStore {
    storage_dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatHistoryStore {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            locks: DashMap::new(),
        }
    }

    /// Start a new active session
    pub async fn create_session(&self, user_id: &str, title: &str) -> Result<ChatSession> {
        let path = self.user_file(user_id)?;
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            is_active: true,
        };

        let mut chats = load(&path).await?;
        chats.sessions.insert(session.id.clone(), session.clone());
        write_json_atomic(&path, &chats).await?;

        tracing::info!("Created chat session {} for {}", session.id, user_id);
        Ok(session)
    }

    /// Append a message and bump `updated_at`
    pub async fn add_message(&self, user_id: &str, session_id: &str, message: NewMessage) -> Result<ChatSession> {
        self.add_messages(user_id, session_id, vec![message]).await
    }

    /// Append several messages in one write so they stay adjacent
    pub async fn add_messages(
        &self,
        user_id: &str,
        session_id: &str,
        messages: Vec<NewMessage>,
    ) -> Result<ChatSession> {
        self.modify(user_id, session_id, |session| {
            let now = Utc::now();
            session
                .messages
                .extend(messages.into_iter().map(|message| ChatMessage {
                    role: message.role,
                    content: message.content,
                    timestamp: now,
                    sources: message.sources,
                }));
            session.updated_at = now;
        })
        .await
    }

    /// An active session, `None` when missing or deleted
    pub async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>> {
        let path = self.user_file(user_id)?;
        let mut chats = load(&path).await?;
        Ok(chats
            .sessions
            .remove(session_id)
            .filter(|session| session.is_active))
    }

    /// Active sessions, most recently updated first
    pub async fn get_user_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let path = self.user_file(user_id)?;
        let chats = load(&path).await?;
        let mut sessions: Vec<ChatSession> = chats
            .sessions
            .into_values()
            .filter(|session| session.is_active)
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    pub async fn update_session_title(&self, user_id: &str, session_id: &str, title: &str) -> Result<ChatSession> {
        self.modify(user_id, session_id, |session| {
            session.title = title.to_string();
            session.updated_at = Utc::now();
        })
        .await
    }

    /// Soft delete; the session stays on disk with `is_active = false`
    pub async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let path = self.user_file(user_id)?;
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut chats = load(&path).await?;
        let Some(session) = chats.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        session.is_active = false;
        write_json_atomic(&path, &chats).await?;

        tracing::info!("Deleted chat session {} for {}", session_id, user_id);
        Ok(true)
    }

    async fn modify<F>(&self, user_id: &str, session_id: &str, apply: F) -> Result<ChatSession>
    where
        F: FnOnce(&mut ChatSession),
    {
        let path = self.user_file(user_id)?;
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut chats = load(&path).await?;
        let session = chats
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        apply(session);
        let updated = session.clone();

        write_json_atomic(&path, &chats).await?;
        Ok(updated)
    }

    fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn user_file(&self, user_id: &str) -> Result<PathBuf> {
        if user_id.is_empty() || user_id.contains(['/', '\\']) || user_id.contains("..") {
            return Err(Error::BadRequest(format!("Invalid user id: {:?}", user_id)));
        }
        Ok(self.storage_dir.join(format!("{}_chats.json", user_id)))
    }
}

async fn load(path: &Path) -> Result<UserChats> {
    Ok(read_json::<UserChats>(path).await?.unwrap_or_default())
}
