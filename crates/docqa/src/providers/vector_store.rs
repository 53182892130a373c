//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;
use crate::types::{Metadata, SearchHit, StoredChunk};

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `LocalVectorStore`: SQLite-persisted collection searched through an HNSW graph
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert entries, all or nothing
    async fn upsert(
        &self,
        ids: Vec<String>,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<()>;

    /// Nearest entries by cosine distance, optionally restricted by exact-match metadata
    async fn query(&self, vector: &[f32], k: usize, filter: Option<Metadata>) -> Result<Vec<SearchHit>>;

    /// Whether a file with this content hash is already indexed
    async fn exists_by_hash(&self, file_hash: &str) -> Result<bool>;

    /// Delete entries matching the filter, returning the count removed
    async fn delete(&self, filter: Metadata) -> Result<usize>;

    /// Get total number of vectors stored
    async fn count(&self) -> Result<usize>;

    /// Sample of stored entries
    async fn peek(&self, limit: usize) -> Result<Vec<StoredChunk>>;

    /// Names of all collections
    async fn collections(&self) -> Result<Vec<String>>;

    /// Drop every entry and rebind to another embedding model
    async fn recreate(&self, embedding_model: &str, dimension: usize) -> Result<()>;

    /// Vector dimension accepted by the collection
    fn dimension(&self) -> usize;

    /// Where the store persists
    fn location(&self) -> PathBuf;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
