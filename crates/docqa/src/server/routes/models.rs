//! Embedding and inference model catalogue and selection

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{ModelQuery, ModelSelectedResponse, ModelsResponse};

/// GET /embedding-models
pub async fn embedding_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.index().available_models().to_vec(),
    })
}

/// POST /set-embedding-model - Drops every stored vector
pub async fn set_embedding_model(
    State(state): State<AppState>,
    Query(params): Query<ModelQuery>,
) -> Result<Json<ModelSelectedResponse>> {
    tracing::warn!(
        "Switching embedding model to {}; the collection will be recreated",
        params.model_name
    );
    state.pipeline().set_embedding_model(&params.model_name).await?;

    Ok(Json(ModelSelectedResponse {
        status: "success".to_string(),
        model: params.model_name,
    }))
}

/// GET /inference-models
pub async fn inference_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.inference_models().to_vec(),
    })
}

/// POST /set-inference-model
pub async fn set_inference_model(
    State(state): State<AppState>,
    Query(params): Query<ModelQuery>,
) -> Result<Json<ModelSelectedResponse>> {
    state.set_inference_model(&params.model_name)?;

    Ok(Json(ModelSelectedResponse {
        status: "success".to_string(),
        model: params.model_name,
    }))
}
