//! Chat routes and chat session management

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{
    ChatQuery, ChatResponse, ChatSession, NewMessage, Role, SessionDeletedResponse, SessionQuery,
    SessionTitleQuery,
};

/// POST /chat - Agent pipeline; always answers
pub async fn chat(State(state): State<AppState>, Query(params): Query<ChatQuery>) -> Json<ChatResponse> {
    let llm = state.active_llm();
    let response = state
        .agents()
        .process_query(&llm, &params.query, params.n_context_chunks)
        .await;

    record_exchange(&state, &params, &response).await;
    Json(response)
}

/// POST /simple-chat - Direct retrieval; retrieval failures are errors
pub async fn simple_chat(
    State(state): State<AppState>,
    Query(params): Query<ChatQuery>,
) -> Result<Json<ChatResponse>> {
    let llm = state.active_llm();
    let response = state
        .agents()
        .simple_chat(&llm, &params.query, params.n_context_chunks)
        .await
        .map_err(|e| {
            tracing::error!("Simple chat failed: {}", e);
            e
        })?;

    record_exchange(&state, &params, &response).await;
    Ok(Json(response))
}

/// POST /chat-langgraph - Node graph, falling back to the agent pipeline
pub async fn chat_workflow(State(state): State<AppState>, Query(params): Query<ChatQuery>) -> Json<ChatResponse> {
    let llm = state.active_llm();
    let response = state
        .agents()
        .process_query_workflow(&llm, &params.query, params.n_context_chunks)
        .await;

    record_exchange(&state, &params, &response).await;
    Json(response)
}

/// Append question and answer to the caller's session; failures are only logged
async fn record_exchange(state: &AppState, params: &ChatQuery, response: &ChatResponse) {
    let (Some(user_id), Some(session_id)) = (&params.user_id, &params.conversation_id) else {
        return;
    };

    let history = state.chat_history();
    match history.get_session(user_id, session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::warn!("Chat session {} not found for {}, not recording", session_id, user_id);
            return;
        }
        Err(e) => {
            tracing::warn!("Could not load chat session {}: {}", session_id, e);
            return;
        }
    }

    let exchange = vec![
        NewMessage {
            role: Role::User,
            content: response.question.clone(),
            sources: Vec::new(),
        },
        NewMessage {
            role: Role::Assistant,
            content: response.answer.clone(),
            sources: response.sources.clone(),
        },
    ];
    if let Err(e) = history.add_messages(user_id, session_id, exchange).await {
        tracing::warn!("Could not record chat exchange in {}: {}", session_id, e);
    }
}

/// POST /chat-sessions?user_id=&title=
pub async fn create_session(
    State(state): State<AppState>,
    Query(params): Query<SessionTitleQuery>,
) -> Result<Json<ChatSession>> {
    let session = state
        .chat_history()
        .create_session(&params.user_id, &params.title)
        .await?;
    Ok(Json(session))
}

/// GET /chat-sessions?user_id=
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<SessionQuery>,
) -> Result<Json<Vec<ChatSession>>> {
    Ok(Json(state.chat_history().get_user_sessions(&params.user_id).await?))
}

/// GET /chat-sessions/:session_id?user_id=
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<SessionQuery>,
) -> Result<Json<ChatSession>> {
    state
        .chat_history()
        .get_session(&params.user_id, &session_id)
        .await?
        .map(Json)
        .ok_or(Error::SessionNotFound(session_id))
}

/// PUT /chat-sessions/:session_id/title?user_id=&title=
pub async fn update_title(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<SessionTitleQuery>,
) -> Result<Json<ChatSession>> {
    let session = state
        .chat_history()
        .update_session_title(&params.user_id, &session_id, &params.title)
        .await?;
    Ok(Json(session))
}

/// POST /chat-sessions/:session_id/messages?user_id=
pub async fn add_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<SessionQuery>,
    Json(message): Json<NewMessage>,
) -> Result<Json<ChatSession>> {
    let session = state
        .chat_history()
        .add_message(&params.user_id, &session_id, message)
        .await?;
    Ok(Json(session))
}

/// DELETE /chat-sessions/:session_id?user_id=
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<SessionQuery>,
) -> Result<Json<SessionDeletedResponse>> {
    let deleted = state
        .chat_history()
        .delete_session(&params.user_id, &session_id)
        .await?;
    Ok(Json(SessionDeletedResponse { deleted }))
}
