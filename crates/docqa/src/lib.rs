//! docqa: document ingestion and agentic question answering
//!
//! Uploaded PDF, DOCX, CSV and text files are extracted, chunked, embedded
//! through Ollama and stored in a local SQLite vector collection. Questions
//! are classified by intent, answered from retrieved context by Gemini or a
//! local Ollama model, and optionally recorded in per-user chat sessions.

pub mod agents;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    chat::ChatSession,
    document::{DocumentMetadata, FileType},
    query::ChatQuery,
    response::{ChatResponse, Source},
};
