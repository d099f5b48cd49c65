//! WebSocket chat transport
//!
//! One socket is one session, even when several sockets share a chat id.
//! Frames are handled one at a time in receipt
//! order, so a confirmation can never overtake the lookup it refers to.

use super::types::{ClientMessage, WsQuery};
use super::AppState;
use crate::runtime::{OutboundMessage, ProductionRuntime};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use std::sync::Arc;

pub const INVALID_FRAME_TEXT: &str =
    "Sorry, I could not read that message. Please send JSON like {\"content\": \"...\"}.";

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let chat_id = query
        .chat_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state.runtime, chat_id))
}

async fn handle_socket(mut socket: WebSocket, runtime: Arc<ProductionRuntime>, chat_id: String) {
    tracing::info!(chat_id = %chat_id, "Client connected");
    let connection = runtime.open_session(&chat_id).await;

    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "WebSocket receive failed");
                break;
            }
        };

        let outbound = match frame {
            Message::Text(text) => match parse_client_frame(&text) {
                Ok(message) => runtime.handle_message(&connection, &message.content).await,
                Err(e) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Malformed client frame");
                    OutboundMessage::error(INVALID_FRAME_TEXT)
                }
            },
            Message::Close(_) => break,
            // Ping/pong are answered by axum; binary frames are not part of the protocol
            _ => continue,
        };

        if let Err(e) = send_frame(&mut socket, &outbound).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "WebSocket send failed");
            break;
        }
    }

    runtime.close_session(&connection).await;
    tracing::info!(chat_id = %chat_id, "Client disconnected");
}

fn parse_client_frame(text: &str) -> Result<ClientMessage, String> {
    let message: ClientMessage = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if message.content.trim().is_empty() {
        return Err("empty content".to_string());
    }
    Ok(message)
}

async fn send_frame(socket: &mut WebSocket, outbound: &OutboundMessage) -> Result<(), String> {
    let json = serde_json::to_string(outbound).map_err(|e| e.to_string())?;
    socket
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
