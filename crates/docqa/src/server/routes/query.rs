//! Semantic search and index introspection

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{DebugResponse, Metadata, SearchQuery, SearchResponse};

const DEBUG_SAMPLE_SIZE: usize = 5;

/// POST /search - Nearest chunks with optional exact-match author/title filters
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let mut filter = Metadata::new();
    if let Some(author) = params.filter_author.filter(|a| !a.is_empty()) {
        filter.insert("author".to_string(), author.into());
    }
    if let Some(title) = params.filter_title.filter(|t| !t.is_empty()) {
        filter.insert("title".to_string(), title.into());
    }
    let filter = (!filter.is_empty()).then_some(filter);

    let active = state.index().read().await;
    let hits = active.search(&params.query, params.n_results, filter).await?;
    tracing::info!("Search '{}' found {} results", params.query, hits.len());

    Ok(Json(SearchResponse {
        query: params.query,
        results: hits.into(),
    }))
}

/// GET /debug-chroma - Collection count, a small sample and every collection name
pub async fn debug_index(State(state): State<AppState>) -> Result<Json<DebugResponse>> {
    let active = state.index().read().await;
    let sample = active.store.peek(DEBUG_SAMPLE_SIZE).await?;
    let (sample_documents, sample_metadatas): (Vec<String>, Vec<Metadata>) = sample.into_iter().map(|c| (c.text, c.metadata)).unzip();

    Ok(Json(DebugResponse {
        chroma_db_path: active.store.location().display().to_string(),
        collection_count: active.store.count().await?,
        sample_documents,
        sample_metadatas,
        available_collections: active.store.collections().await?,
    }))
}
