//! Application state for the document Q&A server

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::AgentOrchestrator;
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::{IngestionPipeline, TextChunker, UploadLog};
use crate::processing::{ProgressHub, ProgressReporter};
use crate::providers::{build_embedder, build_llm, ActiveLlm, LlmProvider, LocalVectorStore};
use crate::retrieval::{EmbedderFactory, HnswParams, IndexHandle, VectorStore};
use crate::storage::ChatHistoryStore;

/// Builds a generative model for a catalogue name
pub type LlmFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Embedding model, embedder and collection
    index: Arc<IndexHandle>,
    /// Upload processing
    pipeline: IngestionPipeline,
    /// Progress listeners for `/ws/progress`
    progress: Arc<ProgressHub>,
    /// Chat agents
    agents: AgentOrchestrator,
    /// Selected inference model
    llm: RwLock<ActiveLlm>,
    llm_factory: LlmFactory,
    /// Per-user chat sessions
    chat_history: ChatHistoryStore,
}

impl AppState {
    /// Create application state backed by Ollama, Gemini and the on-disk index
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing docqa application state...");

        let default_model = config.embeddings.default_model.clone();
        let default_spec = config
            .embeddings
            .model(&default_model)
            .ok_or_else(|| Error::Config(format!("Unknown embedding model '{}'", default_model)))?;

        let vector_db = config.vector_db.clone();
        let default_dims = default_spec.dimensions;
        let store = tokio::task::spawn_blocking(move || {
            VectorStore::open(
                &vector_db.storage_path,
                &vector_db.collection,
                &default_model,
                default_dims,
                HnswParams::from(&vector_db),
            )
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        // An existing collection keeps the model it was built with
        let model_name = store.embedding_model();
        if config.embeddings.model(&model_name).is_none() {
            return Err(Error::Config(format!(
                "Collection '{}' was built with '{}', which is not in the embedding catalogue",
                store.name(),
                model_name
            )));
        }
        tracing::info!(
            "Vector store initialized at {} (model {}, dim {})",
            store.path().display(),
            model_name,
            store.dimension()
        );

        let embeddings = config.embeddings.clone();
        let factory: EmbedderFactory = Arc::new(move |name: &str| build_embedder(&embeddings, name));
        let embedder = factory(&model_name)?;

        let index = Arc::new(IndexHandle::new(
            model_name,
            embedder,
            Arc::new(LocalVectorStore::new(Arc::new(store))),
            factory,
            config.embeddings.model_names(),
        ));

        let llm_config = config.llm.clone();
        let llm_factory: LlmFactory = Arc::new(move |name: &str| build_llm(&llm_config, name));

        Self::from_parts(config, index, llm_factory)
    }

    /// Assemble state around an existing index and model factory
    pub fn from_parts(config: RagConfig, index: Arc<IndexHandle>, llm_factory: LlmFactory) -> Result<Self> {
        let chunker = TextChunker::from_config(&config.chunking)?;
        let upload_log = Arc::new(UploadLog::new(config.storage.upload_log_path.clone()));
        let pipeline = IngestionPipeline::new(
            index.clone(),
            chunker,
            upload_log,
            Duration::from_secs(config.processing.file_timeout_secs),
        );

        let agents = AgentOrchestrator::new(index.clone(), Duration::from_secs(config.llm.timeout_secs));

        let default_llm = config.llm.default_model.clone();
        let llm = ActiveLlm::new(default_llm.clone(), llm_factory(&default_llm)?);
        tracing::info!("Inference model: {}", default_llm);

        let chat_history = ChatHistoryStore::new(config.chat_history.storage_dir.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                index,
                pipeline,
                progress: Arc::new(ProgressHub::new()),
                agents,
                llm: RwLock::new(llm),
                llm_factory,
                chat_history,
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.inner.index
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.inner.pipeline
    }

    pub fn progress(&self) -> &Arc<ProgressHub> {
        &self.inner.progress
    }

    /// Reporter publishing to listeners subscribed under `upload_id`
    pub fn reporter(&self, upload_id: Option<String>) -> ProgressReporter {
        ProgressReporter::new(self.inner.progress.clone(), upload_id)
    }

    pub fn agents(&self) -> &AgentOrchestrator {
        &self.inner.agents
    }

    pub fn chat_history(&self) -> &ChatHistoryStore {
        &self.inner.chat_history
    }

    /// Snapshot of the selected inference model
    pub fn active_llm(&self) -> ActiveLlm {
        self.inner.llm.read().clone()
    }

    /// Inference model names
    pub fn inference_models(&self) -> &[String] {
        &self.inner.config.llm.inference_models
    }

    /// Select another inference model; in-flight chats keep their snapshot
    pub fn set_inference_model(&self, model_name: &str) -> Result<()> {
        if !self.inference_models().iter().any(|m| m == model_name) {
            return Err(Error::InvalidModelSelection {
                kind: "inference",
                name: model_name.to_string(),
            });
        }

        let provider = (self.inner.llm_factory)(model_name)?;
        *self.inner.llm.write() = ActiveLlm::new(model_name, provider);
        tracing::info!("Inference model switched to {}", model_name);
        Ok(())
    }
}
