//! Request parameter types

use serde::{Deserialize, Serialize};

/// Query string for `/chat` and its variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatQuery {
    /// The question to answer
    pub query: String,

    /// Session to append the exchange to
    #[serde(default)]
    pub conversation_id: Option<String>,

    /// Owner of the session
    #[serde(default)]
    pub user_id: Option<String>,

    /// Number of chunks to retrieve (default: 5)
    #[serde(default = "default_context_chunks")]
    pub n_context_chunks: usize,
}

fn default_context_chunks() -> usize {
    5
}

impl ChatQuery {
    /// Create a new query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: None,
            user_id: None,
            n_context_chunks: default_context_chunks(),
        }
    }

    /// Set the number of chunks to retrieve
    pub fn with_context_chunks(mut self, n: usize) -> Self {
        self.n_context_chunks = n;
        self
    }
}

/// Query string for `/search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub filter_author: Option<String>,
    #[serde(default)]
    pub filter_title: Option<String>,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
}

fn default_n_results() -> usize {
    10
}

/// Query string carrying an optional progress key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub upload_id: Option<String>,
}

/// Query string for model selection routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelQuery {
    pub model_name: String,
}

/// Query string for `/delete-document`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteQuery {
    pub filename: String,
}

/// Query string identifying the owner of chat sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuery {
    pub user_id: String,
}

/// Query string for creating or renaming a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTitleQuery {
    pub user_id: String,
    #[serde(default = "default_session_title")]
    pub title: String,
}

fn default_session_title() -> String {
    "New Chat".to_string()
}
