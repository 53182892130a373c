//! Ingestion pipeline orchestration
//!
//! validate → metadata → parse → chunk → embed → prepare → store → log, with a
//! progress event per stage. The vector store decides duplicates; the upload
//! log is written after the store and rolled back with it.

use bytes::Bytes;
use dashmap::DashSet;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::processing::{ProgressReporter, Stage};
use crate::retrieval::{ActiveIndex, IndexHandle};
use crate::types::{
    BatchResponse, ChunkMetadata, DocumentMetadata, FileError, FileType, IngestResult, Metadata,
    UploadLogEntry,
};

use super::chunker::TextChunker;
use super::parser::FileParser;
use super::upload_log::UploadLog;

/// Chunks ready to be written
struct PreparedFile {
    file_hash: String,
    metadata: DocumentMetadata,
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
    metadatas: Vec<Metadata>,
}

/// Main ingestion pipeline
pub struct IngestionPipeline {
    index: Arc<IndexHandle>,
    chunker: TextChunker,
    upload_log: Arc<UploadLog>,
    file_timeout: Duration,
    in_flight: DashSet<String>,
}

/// Releases a claimed content hash when dropped
struct HashClaim<'a> {
    set: &'a DashSet<String>,
    hash: String,
}

impl Drop for HashClaim<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.hash);
    }
}

impl IngestionPipeline {
    /// Create a new ingestion pipeline
    pub fn new(
        index: Arc<IndexHandle>,
        chunker: TextChunker,
        upload_log: Arc<UploadLog>,
        file_timeout: Duration,
    ) -> Self {
        Self {
            index,
            chunker,
            upload_log,
            file_timeout,
            in_flight: DashSet::new(),
        }
    }

    /// Upload log backing `/uploaded-files`
    pub fn upload_log(&self) -> &Arc<UploadLog> {
        &self.upload_log
    }

    /// Switch the embedding model, emptying the collection and the upload log together
    pub async fn set_embedding_model(&self, model_name: &str) -> Result<u64> {
        self.index.set_embedding_model(model_name, &self.upload_log).await
    }

    /// Ingest one file
    pub async fn ingest(&self, filename: &str, data: Bytes, progress: &ProgressReporter) -> Result<IngestResult> {
        let active = self.index.read().await;

        progress.stage(Stage::Validating, "Validating file...");
        let file_hash = hash_bytes(&data);
        let _claim = self.claim(filename, &file_hash, &active).await?;

        // Storing is left outside the timeout so a late cancel cannot split store and log
        let prepared = tokio::time::timeout(
            self.file_timeout,
            self.prepare(&active, filename, data, file_hash, progress),
        )
        .await
        .map_err(|_| Error::timeout(format!("Processing {}", filename), self.file_timeout))??;

        self.store(&active, filename, prepared, progress).await
    }

    /// Ingest files one after another; a failing file never aborts the batch
    pub async fn ingest_batch(&self, files: Vec<(String, Bytes)>, progress: &ProgressReporter) -> BatchResponse {
        let total = files.len();
        if total == 0 {
            progress.report(Stage::Error, 0, "No files received for folder upload.");
            return BatchResponse::empty();
        }

        progress.report(Stage::Saving, 0, format!("Starting upload of {} files...", total));

        let mut results = Vec::new();
        let mut errors = Vec::new();

        for (i, (filename, data)) in files.into_iter().enumerate() {
            let n = i + 1;
            progress.report(Stage::Saving, scaled(n, total, 20), format!("Saving files... ({}/{})", n, total));
            progress.report(
                Stage::Processing,
                scaled(n, total, 40),
                format!("Processing {} ({}/{})", filename, n, total),
            );

            match self.ingest(&filename, data, progress).await {
                Ok(result) => {
                    results.push(result);
                    progress.report(
                        Stage::Processing,
                        scaled(n, total, 85),
                        format!("Finished processing {} ({}/{})", filename, n, total),
                    );
                }
                Err(e) => {
                    tracing::error!("Error processing {}: {}", filename, e);
                    progress.report(Stage::Error, scaled(n, total, 100), format!("{}: {}", filename, e));
                    errors.push(FileError {
                        filename,
                        error: e.to_string(),
                    });
                }
            }
        }

        progress.report(
            Stage::Complete,
            100,
            format!(
                "Folder processing complete! {} successful, {} errors",
                results.len(),
                errors.len()
            ),
        );

        BatchResponse::new(results, errors, total)
    }

    /// Remove a document's chunks and log entries, returning the chunk count removed
    pub async fn delete_document(&self, filename: &str) -> Result<usize> {
        let active = self.index.read().await;

        let mut filter = Metadata::new();
        filter.insert("filename".to_string(), filename.into());
        let removed = active.store.delete(filter).await?;
        let log_removed = self.upload_log.remove_by_filename(filename).await?;

        tracing::info!(
            "Deleted {}: {} chunks, {} log entries",
            filename,
            removed,
            log_removed
        );
        Ok(removed)
    }

    async fn claim(&self, filename: &str, file_hash: &str, active: &ActiveIndex) -> Result<HashClaim<'_>> {
        let duplicate = || Error::DuplicateFile {
            filename: filename.to_string(),
            file_hash: file_hash.to_string(),
        };

        if !self.in_flight.insert(file_hash.to_string()) {
            return Err(duplicate());
        }
        let claim = HashClaim {
            set: &self.in_flight,
            hash: file_hash.to_string(),
        };

        if active.store.exists_by_hash(file_hash).await? {
            return Err(duplicate());
        }
        Ok(claim)
    }

    async fn prepare(
        &self,
        active: &ActiveIndex,
        filename: &str,
        data: Bytes,
        file_hash: String,
        progress: &ProgressReporter,
    ) -> Result<PreparedFile> {
        progress.stage(Stage::Metadata, "Extracting metadata...");
        let metadata = extract_metadata(filename, data.clone()).await;

        progress.stage(Stage::Parsing, "Parsing document content...");
        let parsed = FileParser::parse_blocking(filename.to_string(), data).await?;

        progress.stage(Stage::Chunking, format!("Splitting text into chunks...{}", filename));
        let chunks = self.chunker.chunk(filename, &parsed.text)?;

        progress.stage(Stage::Embedding, format!("Generating embeddings...{}", filename));
        let vectors = active.embedder.embed_batch(&chunks).await?;

        progress.stage(Stage::Preparing, format!("Preparing {} for storage...", filename));
        let metadatas = chunks
            .iter()
            .map(|chunk| {
                ChunkMetadata {
                    filename: filename.to_string(),
                    file_hash: file_hash.clone(),
                    chunk_length: chunk.chars().count(),
                    document: metadata.clone(),
                }
                .into_map()
            })
            .collect();

        Ok(PreparedFile {
            file_hash,
            metadata,
            chunks,
            vectors,
            metadatas,
        })
    }

    async fn store(
        &self,
        active: &ActiveIndex,
        filename: &str,
        prepared: PreparedFile,
        progress: &ProgressReporter,
    ) -> Result<IngestResult> {
        progress.stage(Stage::Storing, format!("Storing {} in database...", filename));

        let chunks_stored = prepared.chunks.len();
        let ids = (0..chunks_stored)
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();
        active
            .store
            .upsert(ids, prepared.vectors, prepared.chunks, prepared.metadatas)
            .await?;

        let entry = UploadLogEntry {
            filename: filename.to_string(),
            chunks_stored,
            upload_time: chrono::Utc::now(),
            metadata: prepared.metadata.clone(),
            file_hash: prepared.file_hash.clone(),
        };
        if let Err(e) = self.upload_log.append(entry).await {
            tracing::error!("Upload log write failed for {}, rolling back: {}", filename, e);
            let mut filter = Metadata::new();
            filter.insert("file_hash".to_string(), prepared.file_hash.into());
            if let Err(rollback) = active.store.delete(filter).await {
                tracing::error!("Rollback of {} failed: {}", filename, rollback);
            }
            return Err(e);
        }

        tracing::info!("Stored {} chunks for {}", chunks_stored, filename);
        progress.stage(Stage::Complete, "Processing complete!");

        Ok(IngestResult {
            filename: filename.to_string(),
            chunks_stored,
            embedding_dimension: active.embedder.dimensions(),
            metadata: prepared.metadata,
        })
    }
}

async fn extract_metadata(filename: &str, data: Bytes) -> DocumentMetadata {
    let Some(file_type) = FileType::from_filename(filename) else {
        return DocumentMetadata::titled(filename, 0);
    };

    let name = filename.to_string();
    tokio::task::spawn_blocking(move || FileParser::extract_metadata(&name, file_type, &data))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Metadata extraction aborted: {}", e);
            DocumentMetadata::unknown()
        })
}

/// SHA-256 of the raw upload, hex encoded
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn scaled(n: usize, total: usize, scale: usize) -> u8 {
    (n * scale / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{ProgressHub, ProgressReporter};
    use crate::providers::testing::{FakeEmbedder, FlakyEmbedder};
    use crate::providers::{EmbeddingProvider, LocalVectorStore, RetryPolicy, RetryingEmbedder};
    use crate::retrieval::{EmbedderFactory, VectorStore};
    use tempfile::TempDir;

    const DIMS: usize = 32;

    struct Fixture {
        _dir: TempDir,
        pipeline: IngestionPipeline,
        index: Arc<IndexHandle>,
    }

    fn fixture_with(embedder: Arc<dyn EmbeddingProvider>, log_path: Option<std::path::PathBuf>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalVectorStore::new(Arc::new(
            VectorStore::in_memory("documents", "fake", DIMS).unwrap(),
        )));
        let factory: EmbedderFactory =
            Arc::new(|_: &str| Ok(Arc::new(FakeEmbedder::new(DIMS)) as Arc<dyn EmbeddingProvider>));
        let index = Arc::new(IndexHandle::new("fake", embedder, store, factory, vec!["fake".to_string()]));
        let log = Arc::new(UploadLog::new(
            log_path.unwrap_or_else(|| dir.path().join("document_log.json")),
        ));
        let pipeline = IngestionPipeline::new(
            index.clone(),
            TextChunker::new(512, 50).unwrap(),
            log,
            Duration::from_secs(10),
        );
        Fixture {
            _dir: dir,
            pipeline,
            index,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(FakeEmbedder::new(DIMS)), None)
    }

    fn long_text() -> Bytes {
        let text = (0..334).map(|i| format!("w{:04}", i)).collect::<Vec<_>>().join(" ");
        Bytes::from(text)
    }

    async fn count(index: &IndexHandle) -> usize {
        index.read().await.store.count().await.unwrap()
    }

    #[tokio::test]
    async fn test_ingest_reports_every_stage_in_order() {
        let fx = fixture();
        let hub = Arc::new(ProgressHub::new());
        let mut sub = hub.subscribe(Some("u1".to_string()));
        let progress = ProgressReporter::new(hub, Some("u1".to_string()));

        let result = fx.pipeline.ingest("long.txt", long_text(), &progress).await.unwrap();
        assert!(result.chunks_stored >= 4);
        assert_eq!(result.embedding_dimension, DIMS);
        assert_eq!(result.metadata.title, "long.txt");
        assert_eq!(count(&fx.index).await, result.chunks_stored);

        let mut seen = Vec::new();
        while let Ok(event) = sub.receiver.try_recv() {
            seen.push((event.stage, event.progress));
        }
        assert_eq!(
            seen,
            vec![
                (Stage::Validating, 10),
                (Stage::Metadata, 20),
                (Stage::Parsing, 30),
                (Stage::Chunking, 50),
                (Stage::Embedding, 70),
                (Stage::Preparing, 85),
                (Stage::Storing, 95),
                (Stage::Complete, 100),
            ]
        );

        let log = fx.pipeline.upload_log().list().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].chunks_stored, result.chunks_stored);
        assert_eq!(log[0].file_hash, hash_bytes(&long_text()));
    }

    #[tokio::test]
    async fn test_chunk_metadata_is_complete() {
        let fx = fixture();
        fx.pipeline
            .ingest("note.txt", Bytes::from_static(b"short note"), &ProgressReporter::detached())
            .await
            .unwrap();

        let active = fx.index.read().await;
        let sample = active.store.peek(1).await.unwrap();
        let meta = &sample[0].metadata;
        assert_eq!(meta["filename"], "note.txt");
        assert_eq!(meta["chunk_length"], 10);
        assert_eq!(meta["author"], "Unknown");
        assert_eq!(meta["file_hash"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_duplicate_content_rejected_before_storing() {
        let fx = fixture();
        let progress = ProgressReporter::detached();

        fx.pipeline.ingest("a.txt", long_text(), &progress).await.unwrap();
        let before = count(&fx.index).await;

        let err = fx.pipeline.ingest("renamed.txt", long_text(), &progress).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateFile { ref filename, .. } if filename == "renamed.txt"));
        assert_eq!(err.to_string(), "File already indexed: renamed.txt");
        assert_eq!(count(&fx.index).await, before);
        assert_eq!(fx.pipeline.upload_log().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_chunks_and_log() {
        let fx = fixture();
        let progress = ProgressReporter::detached();
        fx.pipeline.ingest("a.txt", long_text(), &progress).await.unwrap();
        fx.pipeline
            .ingest("b.txt", Bytes::from_static(b"other file"), &progress)
            .await
            .unwrap();

        let removed = fx.pipeline.delete_document("a.txt").await.unwrap();
        assert!(removed >= 4);
        assert_eq!(count(&fx.index).await, 1);

        let log = fx.pipeline.upload_log().list().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].filename, "b.txt");

        // Same content can be ingested again once deleted
        fx.pipeline.ingest("a.txt", long_text(), &progress).await.unwrap();
    }

    #[tokio::test]
    async fn test_model_swap_empties_log_with_store() {
        let fx = fixture();
        let progress = ProgressReporter::detached();
        fx.pipeline.ingest("a.txt", long_text(), &progress).await.unwrap();
        assert_eq!(fx.pipeline.upload_log().list().await.unwrap().len(), 1);

        let version = fx.pipeline.set_embedding_model("fake").await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(count(&fx.index).await, 0);
        assert!(fx.pipeline.upload_log().list().await.unwrap().is_empty());

        // Re-uploading after the swap leaves exactly one entry for the content
        let result = fx.pipeline.ingest("a.txt", long_text(), &progress).await.unwrap();
        let log = fx.pipeline.upload_log().list().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].file_hash, hash_bytes(&long_text()));
        assert_eq!(count(&fx.index).await, result.chunks_stored);
    }

    #[tokio::test]
    async fn test_batch_collects_errors() {
        let fx = fixture();
        let hub = Arc::new(ProgressHub::new());
        let mut sub = hub.subscribe(None);
        let progress = ProgressReporter::new(hub, None);

        let files = vec![
            ("good.txt".to_string(), Bytes::from_static(b"some content")),
            ("slides.pptx".to_string(), Bytes::from_static(b"binary")),
            ("blank.txt".to_string(), Bytes::from_static(b"   ")),
        ];
        let response = fx.pipeline.ingest_batch(files, &progress).await;

        assert_eq!(response.status, "success");
        assert_eq!(response.processed_count, 1);
        assert_eq!(response.error_count, 2);
        assert_eq!(response.total_files, 3);
        assert_eq!(response.errors[0].filename, "slides.pptx");
        assert_eq!(response.errors[1].error, "No readable text found in blank.txt");

        let mut last = None;
        while let Ok(event) = sub.receiver.try_recv() {
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.stage, Stage::Complete);
        assert_eq!(last.message, "Folder processing complete! 1 successful, 2 errors");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let fx = fixture();
        let response = fx.pipeline.ingest_batch(Vec::new(), &ProgressReporter::detached()).await;
        assert_eq!(response.status, "failed");
        assert_eq!(response.error_count, 1);
        assert_eq!(response.errors[0].error, "No files received");
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let failing = Arc::new(RetryingEmbedder::new(
            Arc::new(FlakyEmbedder::new(DIMS, u32::MAX)),
            RetryPolicy {
                max_attempts: 2,
                backoff: Duration::from_millis(1),
                attempt_timeout: Duration::from_secs(1),
            },
        ));
        let fx = fixture_with(failing, None);

        let err = fx
            .pipeline
            .ingest("a.txt", long_text(), &ProgressReporter::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable { attempts: 2, .. }));
        assert_eq!(count(&fx.index).await, 0);
        assert!(fx.pipeline.upload_log().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_failure_rolls_back_store() {
        let blocker = tempfile::tempdir().unwrap();
        // A directory where the log file should be makes the rename fail
        let log_path = blocker.path().join("document_log.json");
        std::fs::create_dir_all(&log_path).unwrap();

        let fx = fixture_with(Arc::new(FakeEmbedder::new(DIMS)), Some(log_path));
        let result = fx
            .pipeline
            .ingest("a.txt", long_text(), &ProgressReporter::detached())
            .await;

        assert!(result.is_err());
        assert_eq!(count(&fx.index).await, 0);
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_scaled_progress_truncates() {
        assert_eq!(scaled(1, 3, 20), 6);
        assert_eq!(scaled(3, 3, 85), 85);
        assert_eq!(scaled(2, 3, 100), 66);
    }
}
