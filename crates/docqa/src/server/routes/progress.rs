//! WebSocket progress feed

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};

use crate::processing::{ProgressEvent, Subscription};
use crate::server::state::AppState;
use crate::types::UploadQuery;

/// WS /ws/progress?upload_id= - Events of uploads carrying the same key
pub async fn progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<UploadQuery>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let subscription = state.progress().subscribe(params.upload_id);
        let (id, key) = (subscription.id, subscription.key.clone());
        forward(socket, subscription).await;
        state.progress().unsubscribe(&key, id);
        tracing::debug!("Progress listener {} disconnected", id);
    })
}

/// Relay events until either side goes away; client text frames are keepalives
async fn forward(mut socket: WebSocket, mut subscription: Subscription) {
    loop {
        tokio::select! {
            event = subscription.receiver.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ProgressEvent) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Could not serialize progress event: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(payload)).await
}
