//! Chat session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::response::Source;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message in a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// A conversation owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// False once soft-deleted
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// On-disk layout of a user's chat file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserChats {
    #[serde(default)]
    pub sessions: HashMap<String, ChatSession>,
}

/// Body for appending a message through the HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}
