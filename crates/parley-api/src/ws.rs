//! WebSocket endpoint at `/ws`.
//!
//! Each connection gets a writer task draining its relay channel and a reader
//! loop that hands text frames to the relay one at a time.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use parley_core::protocol::ServerEvent;

use crate::relay::OutboundRx;
use crate::state::AppState;

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Closed,
    Errored,
}

/// GET /ws - upgrade to a relay connection.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, outbound) = state.relay.register();
    info!(connection_id = %connection_id, "Client connected");

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_loop(sink, outbound, connection_id.clone()));

    let termination = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                state.relay.handle_frame(&connection_id, text.as_str()).await;
            }
            Some(Ok(Message::Close(_))) | None => break Termination::Closed,
            // Pings are answered by axum; binary frames are not part of the protocol.
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                break Termination::Errored;
            }
        }
    };

    state.relay.unregister(&connection_id);
    writer.abort();
    info!(connection_id = %connection_id, termination = ?termination, "Client disconnected");
}

/// Forward relay events to the socket in the order they were issued.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: OutboundRx,
    connection_id: String,
) {
    while let Some(event) = outbound.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Failed to serialize event");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            warn!(connection_id = %connection_id, error = %e, "WebSocket send error");
            break;
        }
        if let ServerEvent::Message { message } = &event {
            debug!(connection_id = %connection_id, message_id = %message.id, "Delivered message");
        }
    }
}
