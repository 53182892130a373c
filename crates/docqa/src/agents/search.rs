//! Retrieval agent: embeds the question and collects context and sources

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::retrieval::IndexHandle;
use crate::types::{SearchHit, Source};

/// Context chunks and deduplicated sources for one question
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub context_chunks: Vec<String>,
    pub sources: Vec<Source>,
    pub total_chunks_found: usize,
    /// Set when retrieval failed and the outcome is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    fn from_hits(hits: Vec<SearchHit>) -> Self {
        let sources = dedup_sources(&hits);
        let context_chunks: Vec<String> = hits.into_iter().map(|h| h.text).collect();
        Self {
            total_chunks_found: context_chunks.len(),
            context_chunks,
            sources,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Sources in hit order, first occurrence of each filename/title pair wins
pub fn dedup_sources(hits: &[SearchHit]) -> Vec<Source> {
    let mut seen = HashSet::new();
    hits.iter()
        .map(|hit| Source::from_metadata(&hit.metadata))
        .filter(|source| seen.insert(source.dedup_key()))
        .collect()
}

/// Searches the active index
pub struct SearchAgent {
    index: Arc<IndexHandle>,
}

impl SearchAgent {
    pub fn new(index: Arc<IndexHandle>) -> Self {
        Self { index }
    }

    /// Retrieve the top `n` chunks; failures propagate
    pub async fn retrieve(&self, query: &str, n: usize) -> Result<SearchOutcome> {
        let active = self.index.read().await;
        let hits = active.search(query, n, None).await?;
        Ok(SearchOutcome::from_hits(hits))
    }

    /// Retrieve the top `n` chunks; a failure yields an empty outcome carrying the error
    pub async fn search(&self, query: &str, n: usize) -> SearchOutcome {
        match self.retrieve(query, n).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Document search failed: {}", e);
                SearchOutcome::failed(e.to_string())
            }
        }
    }
}
