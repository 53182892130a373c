//! HTTP routes for the document Q&A server

pub mod chat;
pub mod documents;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::server::state::AppState;

/// Build all routes; paths are served at the root
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion - with larger body limit for file uploads
        .route(
            "/upload",
            post(ingest::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/upload-folder",
            post(ingest::upload_folder).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/ws/progress", get(progress::progress_ws))
        // Index
        .route("/status", get(documents::status))
        .route("/uploaded-files", get(documents::uploaded_files))
        .route("/delete-document", delete(documents::delete_document))
        .route("/search", post(query::search))
        .route("/debug-chroma", get(query::debug_index))
        // Models
        .route("/embedding-models", get(models::embedding_models))
        .route("/set-embedding-model", post(models::set_embedding_model))
        .route("/inference-models", get(models::inference_models))
        .route("/set-inference-model", post(models::set_inference_model))
        // Chat
        .route("/chat", post(chat::chat))
        .route("/simple-chat", post(chat::simple_chat))
        .route("/chat-langgraph", post(chat::chat_workflow))
        // Chat sessions
        .route(
            "/chat-sessions",
            post(chat::create_session).get(chat::list_sessions),
        )
        .route(
            "/chat-sessions/:session_id",
            get(chat::get_session).delete(chat::delete_session),
        )
        .route("/chat-sessions/:session_id/title", put(chat::update_title))
        .route("/chat-sessions/:session_id/messages", post(chat::add_message))
}
