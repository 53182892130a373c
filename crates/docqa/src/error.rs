//! Error types for the document Q&A service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for docqa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// File extension has no extractor
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// File could not be decoded
    #[error("Could not read '{filename}': {message}")]
    UnreadableContent { filename: String, message: String },

    /// Extraction produced only whitespace
    #[error("No readable text found in {0}")]
    NoReadableText(String),

    /// Chunker produced nothing
    #[error("No chunks created from {0}")]
    EmptyChunkSet(String),

    /// Content hash already present in the index
    #[error("File already indexed: {filename}")]
    DuplicateFile { filename: String, file_hash: String },

    /// A single embedding attempt failed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Embedding failed after every retry
    #[error("Embedding failed after {attempts} retries: {last_error}")]
    EmbeddingUnavailable { attempts: u32, last_error: String },

    /// Vector length does not match the collection
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Chat session missing from the user's history
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Unknown embedding or inference model
    #[error("Invalid {kind} model: {name}")]
    InvalidModelSelection { kind: &'static str, name: String },

    /// Operation exceeded its time budget
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Generative model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unreadable content error
    pub fn unreadable(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnreadableContent {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            secs: duration.as_secs(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_) | Error::Http(_) | Error::Timeout { .. } | Error::Io(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::VectorDb(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::UnsupportedFileType(_) => (StatusCode::BAD_REQUEST, "unsupported_type"),
            Error::UnreadableContent { .. } => (StatusCode::BAD_REQUEST, "unreadable_content"),
            Error::NoReadableText(_) => (StatusCode::BAD_REQUEST, "no_readable_text"),
            Error::EmptyChunkSet(_) => (StatusCode::BAD_REQUEST, "empty_chunk_set"),
            Error::DuplicateFile { .. } => (StatusCode::CONFLICT, "duplicate_file"),
            Error::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            Error::EmbeddingUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable")
            }
            Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
            }
            Error::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            Error::InvalidModelSelection { .. } => (StatusCode::BAD_REQUEST, "invalid_model"),
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::VectorDb(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_db_error"),
            Error::Llm(_) => (StatusCode::SERVICE_UNAVAILABLE, "llm_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let dup = Error::DuplicateFile {
            filename: "a.txt".to_string(),
            file_hash: "abc".to_string(),
        };
        assert_eq!(dup.into_response().status(), StatusCode::CONFLICT);

        let missing = Error::SessionNotFound("s1".to_string());
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = Error::InvalidModelSelection {
            kind: "embedding",
            name: "nope".to_string(),
        };
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::embedding("connection reset").is_transient());
        assert!(Error::timeout("embed", std::time::Duration::from_secs(3)).is_transient());
        assert!(!Error::DimensionMismatch { expected: 384, actual: 768 }.is_transient());
        assert!(!Error::NoReadableText("x.txt".to_string()).is_transient());
    }
}
