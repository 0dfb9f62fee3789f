//! Socket lifecycle for `/api/v1/ws`
//!
//! Each socket gets an outbox channel registered with the hub. One task
//! drains the outbox into the socket while another reads client frames;
//! whichever finishes first ends the session.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::{ConnectionHub, ConnectionId};
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;

/// Sent on connect while no persistent storage tier is available
pub const DEGRADED_NOTICE: &str = "storage degraded: values are kept in memory only";

/// GET /api/v1/ws
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.ws_hub);
    let degraded = !state.vault.has_persistent_tier();
    ws.on_upgrade(move |socket| run_session(socket, hub, degraded))
}

/// Frames every new socket receives before anything else
fn greeting(id: &str, degraded: bool) -> Vec<ServerMessage> {
    let mut frames = vec![ServerMessage::Connected {
        connection_id: id.to_string(),
    }];
    if degraded {
        frames.push(ServerMessage::System {
            message: DEGRADED_NOTICE.to_string(),
        });
    }
    frames
}

async fn run_session(socket: WebSocket, hub: Arc<ConnectionHub>, degraded: bool) {
    let (mut sink, stream) = socket.split();
    let (outbox, inbox) = mpsc::unbounded_channel::<ServerMessage>();

    let id = match hub.register(outbox).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Refusing WebSocket client");
            push(&mut sink, &ServerMessage::Error { message: e.to_string() }).await;
            return;
        }
    };

    for frame in greeting(&id, degraded) {
        if !push(&mut sink, &frame).await {
            hub.unregister(&id).await;
            return;
        }
    }

    let mut writer = tokio::spawn(drain_outbox(sink, inbox, id.clone()));
    let mut reader = tokio::spawn(read_frames(stream, Arc::clone(&hub), id.clone()));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.unregister(&id).await;
}

/// Send one message straight to the socket; false if it could not be written
async fn push(sink: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    match encode(message) {
        Some(text) => sink.send(Message::Text(text)).await.is_ok(),
        None => false,
    }
}

async fn drain_outbox(
    mut sink: SplitSink<WebSocket, Message>,
    mut inbox: mpsc::UnboundedReceiver<ServerMessage>,
    id: ConnectionId,
) {
    while let Some(message) = inbox.recv().await {
        let Some(text) = encode(&message) else { continue };
        if sink.send(Message::Text(text)).await.is_err() {
            tracing::debug!(connection_id = %id, "Socket closed while writing");
            break;
        }
    }
}

async fn read_frames(mut stream: SplitStream<WebSocket>, hub: Arc<ConnectionHub>, id: ConnectionId) {
    while let Some(frame) = stream.next().await {
        let keep_open = match frame {
            Ok(frame) => handle_frame(&hub, &id, frame).await,
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Socket read failed");
                false
            }
        };
        if !keep_open {
            break;
        }
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

/// React to one client frame; false ends the session
async fn handle_frame(hub: &ConnectionHub, id: &str, frame: Message) -> bool {
    let reply = match frame {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(request) => answer(hub, id, request).await,
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Unparseable client frame");
                ServerMessage::Error {
                    message: format!("Invalid message format: {}", e),
                }
            }
        },
        Message::Binary(_) => ServerMessage::Error {
            message: "Binary messages not supported".to_string(),
        },
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => return true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %id, "Client closed the socket");
            return false;
        }
    };

    if let Err(e) = hub.send_to(id, reply).await {
        tracing::debug!(connection_id = %id, error = %e, "Reply dropped");
    }
    true
}

async fn answer(hub: &ConnectionHub, id: &str, request: ClientMessage) -> ServerMessage {
    let outcome = match request {
        ClientMessage::Ping => return ServerMessage::Pong,
        ClientMessage::Subscribe { topics } => hub
            .subscribe(id, topics)
            .await
            .map(|topics| ServerMessage::Subscribed { topics }),
        ClientMessage::Unsubscribe { topics } => hub
            .unsubscribe(id, topics)
            .await
            .map(|topics| ServerMessage::Unsubscribed { topics }),
    };

    outcome.unwrap_or_else(|e| {
        tracing::warn!(connection_id = %id, error = %e, "Subscription request failed");
        ServerMessage::Error {
            message: e.to_string(),
        }
    })
}
