use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use backend_application::realtime::OutboundFrame;
use backend_application::AppState;
use backend_domain::{ConnectionId, MembershipToken, RoomId};

use crate::middleware::membership_token;

/// Client-to-server socket frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    LeaveRoom {
        #[serde(rename = "roomId")]
        room_id: String,
    },
}

pub async fn socket_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = membership_token(&headers, &state.config.cookie_name);
    ws.on_upgrade(move |socket| serve_socket(state, socket, token))
}

async fn serve_socket(state: AppState, socket: WebSocket, token: Option<MembershipToken>) {
    let (connection_id, mut outbound) = state.gateway.connect(token);
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(err) => {
                    warn!("failed to encode socket frame: {}", err);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_client_frame(&state, connection_id, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!("socket {} read failed: {}", connection_id, err);
                break;
            }
        }
    }

    state.gateway.disconnect(connection_id).await;
    writer.abort();
}

async fn handle_client_frame(state: &AppState, connection_id: ConnectionId, text: &str) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(err) => {
            state
                .gateway
                .send_to(connection_id, OutboundFrame::error(format!("malformed frame: {}", err)));
            return;
        }
    };

    match frame {
        ClientFrame::JoinRoom { room_id } => {
            let result = match RoomId::parse(&room_id) {
                Ok(room_id) => state
                    .gateway
                    .join(connection_id, room_id)
                    .await
                    .map(|_| ())
                    .map_err(|err| err.to_string()),
                Err(err) => Err(err.to_string()),
            };
            if let Err(message) = result {
                state.gateway.send_to(connection_id, OutboundFrame::error(message));
            }
        }
        ClientFrame::LeaveRoom { room_id } => match RoomId::parse(&room_id) {
            Ok(room_id) => {
                state.gateway.leave(connection_id, &room_id).await;
            }
            Err(err) => {
                state
                    .gateway
                    .send_to(connection_id, OutboundFrame::error(err.to_string()));
            }
        },
    }
}
