//! Core types for the document Q&A service

pub mod chat;
pub mod document;
pub mod query;
pub mod response;

pub use chat::{ChatMessage, ChatSession, NewMessage, Role, UserChats};
pub use document::{
    ChunkMetadata, DocumentMetadata, FileType, Metadata, SearchHit, StoredChunk, UploadLogEntry,
};
pub use query::{
    ChatQuery, DeleteQuery, ModelQuery, SearchQuery, SessionQuery, SessionTitleQuery, UploadQuery,
};
pub use response::{
    BatchResponse, ChatResponse, DebugResponse, DeleteResponse, FileError, IngestResult,
    ModelSelectedResponse, ModelsResponse, SearchColumns, SearchResponse, SessionDeletedResponse, Source,
    StatusResponse, UploadResponse, UploadedFilesResponse,
};
