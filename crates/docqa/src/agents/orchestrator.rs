//! Question answering over the active index: analyze, search, generate

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::providers::ActiveLlm;
use crate::retrieval::IndexHandle;
use crate::types::ChatResponse;

use super::answer::AnswerGenerator;
use super::query_analyzer;
use super::search::SearchAgent;
use super::workflow::{AgentState, Workflow};

/// Runs the agent pipeline for the chat routes
pub struct AgentOrchestrator {
    search: SearchAgent,
    answers: AnswerGenerator,
    workflow: Workflow,
}

impl AgentOrchestrator {
    pub fn new(index: Arc<IndexHandle>, generation_timeout: Duration) -> Self {
        Self {
            search: SearchAgent::new(index),
            answers: AnswerGenerator::new(generation_timeout),
            workflow: Workflow::question_answering(),
        }
    }

    pub fn search_agent(&self) -> &SearchAgent {
        &self.search
    }

    pub fn answer_generator(&self) -> &AnswerGenerator {
        &self.answers
    }

    /// Answer a question; never fails, degraded answers carry the error text
    pub async fn process_query(&self, llm: &ActiveLlm, query: &str, n_context_chunks: usize) -> ChatResponse {
        let analysis = query_analyzer::analyze(query);
        tracing::info!(
            "Processing {} query with {} context chunks",
            analysis.query_type.as_str(),
            n_context_chunks
        );

        let outcome = self.search.search(query, n_context_chunks).await;
        let answer = self
            .answers
            .generate(llm.provider.as_ref(), query, &outcome.context_chunks, &analysis)
            .await;

        ChatResponse {
            question: query.to_string(),
            answer,
            sources: outcome.sources,
            model_used: llm.name.clone(),
            workflow_used: None,
        }
    }

    /// Answer through the node graph
    pub async fn run_workflow(&self, llm: &ActiveLlm, query: &str, n_context_chunks: usize) -> Result<ChatResponse> {
        let state = self
            .workflow
            .invoke(self, llm, AgentState::new(query, n_context_chunks))
            .await?;
        state.into_response(&llm.name)
    }

    /// Workflow answer, falling back to [`Self::process_query`] if the graph fails
    pub async fn process_query_workflow(&self, llm: &ActiveLlm, query: &str, n_context_chunks: usize) -> ChatResponse {
        match self.run_workflow(llm, query, n_context_chunks).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Workflow failed, falling back to orchestrator: {}", e);
                self.process_query(llm, query, n_context_chunks).await
            }
        }
    }

    /// Direct retrieval and generation; retrieval errors propagate
    pub async fn simple_chat(&self, llm: &ActiveLlm, query: &str, n_context_chunks: usize) -> Result<ChatResponse> {
        let outcome = self.search.retrieve(query, n_context_chunks).await?;
        let analysis = query_analyzer::analyze(query);
        let answer = self
            .answers
            .generate(llm.provider.as_ref(), query, &outcome.context_chunks, &analysis)
            .await;

        Ok(ChatResponse {
            question: query.to_string(),
            answer,
            sources: outcome.sources,
            model_used: llm.name.clone(),
            workflow_used: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ProgressReporter;
    use crate::ingestion::{IngestionPipeline, TextChunker, UploadLog};
    use crate::providers::testing::{FakeEmbedder, FakeLlm};
    use crate::providers::{EmbeddingProvider, LocalVectorStore};
    use crate::retrieval::{EmbedderFactory, VectorStore};
    use bytes::Bytes;
    use tempfile::TempDir;

    const DIMS: usize = 32;

    struct Fixture {
        _dir: TempDir,
        index: Arc<IndexHandle>,
        pipeline: IngestionPipeline,
        orchestrator: AgentOrchestrator,
    }

    fn fixture_with(embedder: FakeEmbedder) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalVectorStore::new(Arc::new(
            VectorStore::in_memory("documents", "fake", DIMS).unwrap(),
        )));
        let factory: EmbedderFactory =
            Arc::new(|_: &str| Ok(Arc::new(FakeEmbedder::new(DIMS)) as Arc<dyn EmbeddingProvider>));
        let index = Arc::new(IndexHandle::new(
            "fake",
            Arc::new(embedder),
            store,
            factory,
            vec!["fake".to_string()],
        ));
        let pipeline = IngestionPipeline::new(
            index.clone(),
            TextChunker::new(512, 50).unwrap(),
            Arc::new(UploadLog::new(dir.path().join("document_log.json"))),
            Duration::from_secs(10),
        );
        let orchestrator = AgentOrchestrator::new(index.clone(), Duration::from_secs(5));
        Fixture {
            _dir: dir,
            index,
            pipeline,
            orchestrator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeEmbedder::new(DIMS))
    }

    fn llm(fake: FakeLlm) -> (Arc<FakeLlm>, ActiveLlm) {
        let fake = Arc::new(fake);
        (fake.clone(), ActiveLlm::new("gemini", fake))
    }

    async fn ingest(fx: &Fixture, name: &str, text: &str) {
        fx.pipeline
            .ingest(name, Bytes::from(text.to_string()), &ProgressReporter::detached())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_definition_question_over_ingested_document() {
        let fx = fixture();
        ingest(
            &fx,
            "nn.txt",
            "A neural network is a computing system of connected layers that learns weights from data.",
        )
        .await;
        let (fake, active) = llm(FakeLlm::answering("## Definition\nA neural network is..."));

        let response = fx
            .orchestrator
            .process_query(&active, "What is a neural network?", 5)
            .await;

        assert_eq!(response.question, "What is a neural network?");
        assert_eq!(response.answer, "## Definition\nA neural network is...");
        assert_eq!(response.model_used, "gemini");
        assert!(response.workflow_used.is_none());
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].filename, "nn.txt");
        assert_eq!(response.sources[0].title, "nn.txt");

        let prompt = fake.last_prompt().unwrap();
        assert!(prompt.contains("**Clear Definition**"));
        assert!(prompt.contains("📄 Source 1:\nA neural network is a computing system"));
    }

    #[tokio::test]
    async fn test_generation_failure_still_answers_with_sources() {
        let fx = fixture();
        ingest(&fx, "nn.txt", "A neural network learns weights.").await;
        let (_, active) = llm(FakeLlm::failing("Gemini API key not configured"));

        let response = fx
            .orchestrator
            .process_query(&active, "What is a neural network?", 5)
            .await;

        assert!(response
            .answer
            .starts_with("I found relevant documents but encountered an error: "));
        assert_eq!(response.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_still_generates() {
        let fx = fixture();
        let (fake, active) = llm(FakeLlm::answering("The documents do not cover this."));

        let response = fx.orchestrator.process_query(&active, "Compare A vs B", 5).await;
        assert_eq!(response.answer, "The documents do not cover this.");
        assert!(response.sources.is_empty());
        assert!(fake.last_prompt().unwrap().contains("compare the concepts asked about"));
    }

    #[tokio::test]
    async fn test_workflow_marks_response() {
        let fx = fixture();
        ingest(&fx, "steps.txt", "Step one: mix. Step two: bake.").await;
        let (_, active) = llm(FakeLlm::answering("Mix, then bake."));

        let response = fx
            .orchestrator
            .process_query_workflow(&active, "How do I bake?", 3)
            .await;
        assert_eq!(response.answer, "Mix, then bake.");
        assert_eq!(response.workflow_used.as_deref(), Some("langgraph"));
        assert_eq!(response.model_used, "gemini");
        assert_eq!(response.sources[0].filename, "steps.txt");
    }

    #[tokio::test]
    async fn test_simple_chat_propagates_retrieval_errors() {
        let fx = fixture_with(FakeEmbedder::new(8).reporting_dimensions(DIMS));
        let (fake, active) = llm(FakeLlm::answering("unused"));

        let err = fx.orchestrator.simple_chat(&active, "anything", 5).await;
        assert!(err.is_err());
        assert!(fake.last_prompt().is_none());

        // the agent pipeline answers with empty context instead
        let response = fx.orchestrator.process_query(&active, "anything", 5).await;
        assert_eq!(response.answer, "unused");
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_simple_chat_answers() {
        let fx = fixture();
        ingest(&fx, "a.txt", "Alpha particles are helium nuclei.").await;
        let (_, active) = llm(FakeLlm::answering("Helium nuclei."));

        let response = fx.orchestrator.simple_chat(&active, "alpha particles", 5).await.unwrap();
        assert_eq!(response.answer, "Helium nuclei.");
        assert_eq!(response.sources.len(), 1);
        assert!(fx.index.read().await.store.count().await.unwrap() >= 1);
    }
}
