//! Local provider implementation over the SQLite + HNSW vector collection
//!
//! Wraps the synchronous `VectorStore` and moves every call onto the blocking pool.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::retrieval::VectorStore;
use crate::types::{Metadata, SearchHit, StoredChunk};

use super::vector_store::VectorStoreProvider;

/// Local vector store wrapping the SQLite collection
pub struct LocalVectorStore {
    store: Arc<VectorStore>,
}

impl LocalVectorStore {
    /// Create from existing VectorStore
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&VectorStore) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn upsert(
        &self,
        ids: Vec<String>,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<()> {
        self.blocking(move |store| store.upsert(ids, vectors, texts, metadatas))
            .await
    }

    async fn query(&self, vector: &[f32], k: usize, filter: Option<Metadata>) -> Result<Vec<SearchHit>> {
        let vector = vector.to_vec();
        self.blocking(move |store| store.query(&vector, k, filter.as_ref()))
            .await
    }

    async fn exists_by_hash(&self, file_hash: &str) -> Result<bool> {
        let hash = file_hash.to_string();
        self.blocking(move |store| store.exists_by_hash(&hash)).await
    }

    async fn delete(&self, filter: Metadata) -> Result<usize> {
        self.blocking(move |store| store.delete(&filter)).await
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.store.count())
    }

    async fn peek(&self, limit: usize) -> Result<Vec<StoredChunk>> {
        self.blocking(move |store| store.peek(limit)).await
    }

    async fn collections(&self) -> Result<Vec<String>> {
        self.blocking(|store| store.collections()).await
    }

    async fn recreate(&self, embedding_model: &str, dimension: usize) -> Result<()> {
        let model = embedding_model.to_string();
        self.blocking(move |store| store.recreate(&model, dimension)).await
    }

    fn dimension(&self) -> usize {
        self.store.dimension()
    }

    fn location(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    fn name(&self) -> &str {
        "local-sqlite"
    }
}
