//! services/api/src/web/ws_handler.rs
//!
//! The WebSocket endpoint a browser keeps open while a report is generated. It
//! subscribes to the session's progress channel and forwards every message as JSON
//! text until either side goes away.

use crate::web::state::{AppState, SessionEntry};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match app_state.sessions.get(&session_id).await {
        Some(entry) => ws.on_upgrade(move |socket| handle_socket(socket, entry, session_id)),
        None => (
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        )
            .into_response(),
    }
}

async fn handle_socket(socket: WebSocket, entry: Arc<SessionEntry>, session_id: String) {
    info!("New WebSocket connection established for session: {}", session_id);

    let (mut sender, mut receiver) = socket.split();
    let mut progress = entry.progress.subscribe();

    loop {
        tokio::select! {
            message = progress.recv() => match message {
                Ok(message) => {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize progress message: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session {}: socket lagged, {} messages skipped.", session_id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("Session {}: WebSocket error: {}", session_id, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!("WebSocket connection closed for session: {}", session_id);
}
