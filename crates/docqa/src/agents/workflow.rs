//! Node graph over a shared agent state
//!
//! `analyze_query → search_documents → generate_answer → END`. Each node
//! fills one slot of [`AgentState`]; a node that finds its inputs missing
//! fails the run so the caller can fall back.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::providers::ActiveLlm;
use crate::types::ChatResponse;

use super::orchestrator::AgentOrchestrator;
use super::query_analyzer::{self, QueryAnalysis};
use super::search::SearchOutcome;

/// Label reported in `workflow_used`
pub const WORKFLOW_NAME: &str = "langgraph";

/// Graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    AnalyzeQuery,
    SearchDocuments,
    GenerateAnswer,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::AnalyzeQuery => "analyze_query",
            Node::SearchDocuments => "search_documents",
            Node::GenerateAnswer => "generate_answer",
        }
    }
}

/// Edge target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Node(Node),
    End,
}

/// State threaded through the graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentState {
    pub query: String,
    pub query_analysis: Option<QueryAnalysis>,
    pub search_results: Option<SearchOutcome>,
    pub final_answer: Option<String>,
    pub n_context_chunks: usize,
    /// Nodes in execution order
    pub visited: Vec<Node>,
}

impl AgentState {
    pub fn new(query: impl Into<String>, n_context_chunks: usize) -> Self {
        Self {
            query: query.into(),
            n_context_chunks,
            ..Self::default()
        }
    }

    /// Final state as a chat response
    pub fn into_response(self, model_used: &str) -> Result<ChatResponse> {
        let answer = self
            .final_answer
            .ok_or_else(|| Error::internal("workflow finished without an answer"))?;
        let search = self
            .search_results
            .ok_or_else(|| Error::internal("workflow finished without search results"))?;

        Ok(ChatResponse {
            question: self.query,
            answer,
            sources: search.sources,
            model_used: model_used.to_string(),
            workflow_used: Some(WORKFLOW_NAME.to_string()),
        })
    }
}

/// A compiled graph: entry node plus one outgoing edge per node
pub struct Workflow {
    entry: Node,
    edges: Vec<(Node, Next)>,
}

impl Workflow {
    pub fn new(entry: Node) -> Self {
        Self {
            entry,
            edges: Vec::new(),
        }
    }

    pub fn edge(mut self, from: Node, to: Next) -> Self {
        self.edges.retain(|(node, _)| *node != from);
        self.edges.push((from, to));
        self
    }

    /// The question answering graph
    pub fn question_answering() -> Self {
        Self::new(Node::AnalyzeQuery)
            .edge(Node::AnalyzeQuery, Next::Node(Node::SearchDocuments))
            .edge(Node::SearchDocuments, Next::Node(Node::GenerateAnswer))
            .edge(Node::GenerateAnswer, Next::End)
    }

    fn next(&self, node: Node) -> Result<Next> {
        self.edges
            .iter()
            .find(|(from, _)| *from == node)
            .map(|(_, to)| *to)
            .ok_or_else(|| Error::internal(format!("node {} has no outgoing edge", node.name())))
    }

    /// Run from the entry node until `End`
    pub async fn invoke(&self, agents: &AgentOrchestrator, llm: &ActiveLlm, mut state: AgentState) -> Result<AgentState> {
        let max_steps = self.edges.len() + 1;
        let mut current = Next::Node(self.entry);

        while let Next::Node(node) = current {
            if state.visited.len() >= max_steps {
                return Err(Error::internal("workflow did not reach END"));
            }
            tracing::debug!("Workflow node {}", node.name());
            run_node(node, agents, llm, &mut state).await?;
            state.visited.push(node);
            current = self.next(node)?;
        }

        Ok(state)
    }
}

async fn run_node(node: Node, agents: &AgentOrchestrator, llm: &ActiveLlm, state: &mut AgentState) -> Result<()> {
    match node {
        Node::AnalyzeQuery => {
            state.query_analysis = Some(query_analyzer::analyze(&state.query));
        }
        Node::SearchDocuments => {
            let outcome = agents
                .search_agent()
                .search(&state.query, state.n_context_chunks)
                .await;
            state.search_results = Some(outcome);
        }
        Node::GenerateAnswer => {
            let analysis = state
                .query_analysis
                .as_ref()
                .ok_or_else(|| Error::internal("generate_answer ran before analyze_query"))?;
            let search = state
                .search_results
                .as_ref()
                .ok_or_else(|| Error::internal("generate_answer ran before search_documents"))?;
            let answer = agents
                .answer_generator()
                .generate(llm.provider.as_ref(), &state.query, &search.context_chunks, analysis)
                .await;
            state.final_answer = Some(answer);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::QueryType;
    use crate::providers::testing::{FakeEmbedder, FakeLlm};
    use crate::providers::{EmbeddingProvider, LocalVectorStore};
    use crate::retrieval::{EmbedderFactory, IndexHandle, VectorStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn agents() -> AgentOrchestrator {
        let store = Arc::new(LocalVectorStore::new(Arc::new(
            VectorStore::in_memory("documents", "fake", 8).unwrap(),
        )));
        let factory: EmbedderFactory =
            Arc::new(|_: &str| Ok(Arc::new(FakeEmbedder::new(8)) as Arc<dyn EmbeddingProvider>));
        let index = Arc::new(IndexHandle::new(
            "fake",
            Arc::new(FakeEmbedder::new(8)),
            store,
            factory,
            vec!["fake".to_string()],
        ));
        AgentOrchestrator::new(index, Duration::from_secs(5))
    }

    fn llm() -> ActiveLlm {
        ActiveLlm::new("phi3", Arc::new(FakeLlm::answering("answer")))
    }

    #[tokio::test]
    async fn test_nodes_run_in_order() {
        let agents = agents();
        let state = Workflow::question_answering()
            .invoke(&agents, &llm(), AgentState::new("Define latency", 5))
            .await
            .unwrap();

        assert_eq!(
            state.visited,
            vec![Node::AnalyzeQuery, Node::SearchDocuments, Node::GenerateAnswer]
        );
        assert_eq!(state.query_analysis.as_ref().unwrap().query_type, QueryType::Definition);
        assert_eq!(state.search_results.as_ref().unwrap().total_chunks_found, 0);
        assert_eq!(state.final_answer.as_deref(), Some("answer"));

        let response = state.into_response("phi3").unwrap();
        assert_eq!(response.workflow_used.as_deref(), Some("langgraph"));
    }

    #[tokio::test]
    async fn test_missing_inputs_fail_the_run() {
        let agents = agents();
        let graph = Workflow::new(Node::AnalyzeQuery)
            .edge(Node::AnalyzeQuery, Next::Node(Node::GenerateAnswer))
            .edge(Node::GenerateAnswer, Next::End);

        let err = graph
            .invoke(&agents, &llm(), AgentState::new("q", 5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("search_documents"));
    }

    #[tokio::test]
    async fn test_cycles_are_cut_off() {
        let agents = agents();
        let graph = Workflow::new(Node::AnalyzeQuery)
            .edge(Node::AnalyzeQuery, Next::Node(Node::SearchDocuments))
            .edge(Node::SearchDocuments, Next::Node(Node::AnalyzeQuery));

        let err = graph
            .invoke(&agents, &llm(), AgentState::new("q", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_incomplete_state_has_no_response() {
        assert!(AgentState::new("q", 5).into_response("gemini").is_err());
        assert_eq!(Node::SearchDocuments.name(), "search_documents");
    }
}
