//! Versioned active index: embedding model, embedder and collection swapped as one unit

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::error::{Error, Result};
use crate::ingestion::UploadLog;
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::{Metadata, SearchHit};

/// Builds an embedder for a catalogue model name
pub type EmbedderFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// The model, embedder and collection that pipelines run against
pub struct ActiveIndex {
    /// Incremented on every model swap
    pub version: u64,
    /// Public name of the embedding model
    pub model_name: String,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStoreProvider>,
}

impl ActiveIndex {
    /// Embed the query and fetch its nearest chunks
    pub async fn search(&self, query: &str, k: usize, filter: Option<Metadata>) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        self.store.query(&vector, k, filter).await
    }
}

/// Shared handle; readers hold a guard for a whole pipeline run, swaps take the write lock
pub struct IndexHandle {
    active: RwLock<ActiveIndex>,
    factory: EmbedderFactory,
    catalogue: Vec<String>,
}

impl IndexHandle {
    pub fn new(
        model_name: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        factory: EmbedderFactory,
        catalogue: Vec<String>,
    ) -> Self {
        Self {
            active: RwLock::new(ActiveIndex {
                version: 1,
                model_name: model_name.into(),
                embedder,
                store,
            }),
            factory,
            catalogue,
        }
    }

    /// Acquire a consistent view of the active index
    pub async fn read(&self) -> RwLockReadGuard<'_, ActiveIndex> {
        self.active.read().await
    }

    /// Selectable embedding models
    pub fn available_models(&self) -> &[String] {
        &self.catalogue
    }

    /// Switch the embedding model, dropping every stored vector
    ///
    /// The upload log lists what the collection holds, so it is emptied under
    /// the same write guard. Returns the new version.
    pub async fn set_embedding_model(&self, model_name: &str, upload_log: &UploadLog) -> Result<u64> {
        if !self.catalogue.iter().any(|m| m == model_name) {
            return Err(Error::InvalidModelSelection {
                kind: "embedding",
                name: model_name.to_string(),
            });
        }

        let embedder = (self.factory)(model_name)?;
        let dimension = embedder.dimensions();

        let mut active = self.active.write().await;
        active.store.recreate(model_name, dimension).await?;
        active.embedder = embedder;
        active.model_name = model_name.to_string();
        active.version += 1;

        let dropped = upload_log.clear().await?;
        tracing::info!(
            "Embedding model switched to {} (dim {}, index version {}), {} upload log entries cleared",
            model_name,
            dimension,
            active.version,
            dropped
        );
        Ok(active.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::FakeEmbedder;
    use crate::providers::LocalVectorStore;
    use crate::retrieval::VectorStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn upload_log() -> (TempDir, UploadLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = UploadLog::new(dir.path().join("document_log.json"));
        (dir, log)
    }

    fn handle() -> IndexHandle {
        let store = Arc::new(LocalVectorStore::new(Arc::new(
            VectorStore::in_memory("documents", "small", 8).unwrap(),
        )));
        let factory: EmbedderFactory = Arc::new(|name: &str| {
            let dims = if name == "large" { 16 } else { 8 };
            Ok(Arc::new(FakeEmbedder::new(dims)) as Arc<dyn EmbeddingProvider>)
        });
        IndexHandle::new(
            "small",
            Arc::new(FakeEmbedder::new(8)),
            store,
            factory,
            vec!["small".to_string(), "large".to_string()],
        )
    }

    #[tokio::test]
    async fn test_swap_recreates_and_bumps_version() {
        let index = handle();
        {
            let active = index.read().await;
            let v = active.embedder.embed("hello").await.unwrap();
            active
                .store
                .upsert(vec!["1".into()], vec![v], vec!["hello".into()], vec![Metadata::new()])
                .await
                .unwrap();
            assert_eq!(active.store.count().await.unwrap(), 1);
        }

        let (_dir, log) = upload_log();
        let version = index.set_embedding_model("large", &log).await.unwrap();
        assert_eq!(version, 2);

        let active = index.read().await;
        assert_eq!(active.model_name, "large");
        assert_eq!(active.embedder.dimensions(), 16);
        assert_eq!(active.store.dimension(), 16);
        assert_eq!(active.store.count().await.unwrap(), 0);
        assert!(active.search("hello", 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_rejected() {
        let index = handle();
        let (_dir, log) = upload_log();
        let err = index.set_embedding_model("huge", &log).await.unwrap_err();
        assert!(matches!(err, Error::InvalidModelSelection { .. }));
        assert_eq!(index.read().await.version, 1);
    }

    #[tokio::test]
    async fn test_swap_waits_for_readers() {
        let index = Arc::new(handle());
        let guard = index.read().await;

        let writer = {
            let index = index.clone();
            tokio::spawn(async move {
                let (_dir, log) = upload_log();
                index.set_embedding_model("large", &log).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());
        assert_eq!(guard.version, 1);
        drop(guard);

        assert_eq!(writer.await.unwrap().unwrap(), 2);
    }
}
