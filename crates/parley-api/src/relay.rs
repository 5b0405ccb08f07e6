//! Realtime relay.
//!
//! Tracks open WebSocket connections and turns each inbound chat frame into
//! a stored user message, an assistant reply, and two broadcasts to every
//! open connection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use parley_chat::CompletionGateway;
use parley_core::error::ParleyError;
use parley_core::protocol::{ClientEvent, ServerEvent};
use parley_core::types::Sender;
use parley_storage::SessionStore;

/// Outbound half of a connection. The connection's writer task drains it.
pub type OutboundTx = mpsc::UnboundedSender<ServerEvent>;
pub type OutboundRx = mpsc::UnboundedReceiver<ServerEvent>;

pub struct Relay {
    store: Arc<SessionStore>,
    gateway: Arc<CompletionGateway>,
    connections: RwLock<HashMap<String, OutboundTx>>,
}

impl Relay {
    pub fn new(store: Arc<SessionStore>, gateway: Arc<CompletionGateway>) -> Self {
        Self {
            store,
            gateway,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to the broadcast set.
    pub fn register(&self) -> (String, OutboundRx) {
        let id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        match self.connections.write() {
            Ok(mut connections) => {
                connections.insert(id.clone(), tx);
            }
            Err(e) => error!(error = %e, "Connection registry poisoned"),
        }
        (id, rx)
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn unregister(&self, connection_id: &str) {
        match self.connections.write() {
            Ok(mut connections) => {
                connections.remove(connection_id);
            }
            Err(e) => error!(error = %e, "Connection registry poisoned"),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Send `event` to every open connection.
    ///
    /// Senders are cloned out of the registry first so no lock is held while
    /// sending. A connection whose writer has gone away is skipped.
    pub fn broadcast(&self, event: &ServerEvent) {
        let targets: Vec<(String, OutboundTx)> = match self.connections.read() {
            Ok(connections) => connections
                .iter()
                .map(|(id, tx)| (id.clone(), tx.clone()))
                .collect(),
            Err(e) => {
                error!(error = %e, "Connection registry poisoned");
                return;
            }
        };

        for (id, tx) in targets {
            if tx.send(event.clone()).is_err() {
                debug!(connection_id = %id, "Skipping closed connection");
            }
        }
    }

    /// Send `event` to one connection only.
    pub fn send_to(&self, connection_id: &str, event: ServerEvent) {
        let tx = self
            .connections
            .read()
            .ok()
            .and_then(|c| c.get(connection_id).cloned());
        match tx {
            Some(tx) => {
                if tx.send(event).is_err() {
                    debug!(connection_id = %connection_id, "Connection closed before reply");
                }
            }
            None => debug!(connection_id = %connection_id, "Reply to unknown connection dropped"),
        }
    }

    /// Process one inbound text frame from `connection_id`.
    pub async fn handle_frame(&self, connection_id: &str, text: &str) {
        let frame: serde_json::Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Unparsable frame");
                self.send_to(connection_id, ServerEvent::invalid_format());
                return;
            }
        };

        let Some(ClientEvent::Chat {
            session_id,
            content,
            metadata,
        }) = ClientEvent::from_frame(&frame)
        else {
            debug!(connection_id = %connection_id, "Ignoring frame that is not a complete chat event");
            return;
        };

        if let Err(e) = self.process_chat(&session_id, &content, metadata).await {
            error!(
                connection_id = %connection_id,
                session_id = %session_id,
                error = %e,
                "Failed to process chat message"
            );
        }
    }

    /// Store the user message, broadcast it, then store and broadcast the
    /// assistant reply.
    async fn process_chat(
        &self,
        session_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), ParleyError> {
        let user_message = self
            .store
            .create_message(session_id, content, Sender::User, metadata)?;
        self.broadcast(&ServerEvent::Message {
            message: user_message,
        });

        let reply = self.gateway.complete(content).await;

        let assistant_message =
            self.store
                .create_message(session_id, &reply, Sender::Assistant, None)?;
        self.broadcast(&ServerEvent::Message {
            message: assistant_message,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_chat::FallbackResponder;

    fn make_relay() -> (Relay, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::new());
        let gateway = Arc::new(CompletionGateway::fallback_only(
            FallbackResponder::with_selector(Arc::new(|_| 0)),
        ));
        (Relay::new(Arc::clone(&store), gateway), store)
    }

    fn drain(rx: &mut OutboundRx) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_register_and_unregister() {
        let (relay, _) = make_relay();
        let (a, _rx_a) = relay.register();
        let (b, _rx_b) = relay.register();
        assert_ne!(a, b);
        assert_eq!(relay.connection_count(), 2);

        relay.unregister(&a);
        relay.unregister("unknown");
        assert_eq!(relay.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_chat_frame_broadcasts_user_then_assistant() {
        let (relay, store) = make_relay();
        let (a, mut rx_a) = relay.register();
        let (_b, mut rx_b) = relay.register();

        relay
            .handle_frame(&a, r#"{"type":"chat","sessionId":"s1","content":"hello"}"#)
            .await;

        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            assert_eq!(events.len(), 2);
            match (&events[0], &events[1]) {
                (
                    ServerEvent::Message { message: user },
                    ServerEvent::Message { message: reply },
                ) => {
                    assert_eq!(user.sender, Sender::User);
                    assert_eq!(user.content, "hello");
                    assert_eq!(reply.sender, Sender::Assistant);
                    assert!(reply.content.starts_with("Hello!"));
                    assert_eq!(reply.session_id, "s1");
                }
                other => panic!("unexpected events: {:?}", other),
            }
        }

        let stored = store.list_messages("s1").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].sender, Sender::User);
        assert_eq!(stored[1].sender, Sender::Assistant);
    }

    #[tokio::test]
    async fn test_metadata_is_stored_on_user_message() {
        let (relay, store) = make_relay();
        let (a, _rx) = relay.register();
        relay
            .handle_frame(
                &a,
                r#"{"type":"chat","sessionId":"s1","content":"hi","metadata":{"voice":true}}"#,
            )
            .await;

        let stored = store.list_messages("s1").unwrap();
        assert_eq!(stored[0].metadata, Some(serde_json::json!({"voice": true})));
        assert_eq!(stored[1].metadata, None);
    }

    #[tokio::test]
    async fn test_unparsable_frame_replies_only_to_sender() {
        let (relay, store) = make_relay();
        let (a, mut rx_a) = relay.register();
        let (_b, mut rx_b) = relay.register();

        relay.handle_frame(&a, "this is not json").await;

        assert_eq!(drain(&mut rx_a), vec![ServerEvent::invalid_format()]);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(store.stats().unwrap().messages, 0);
    }

    #[tokio::test]
    async fn test_incomplete_frames_are_ignored() {
        let (relay, store) = make_relay();
        let (a, mut rx_a) = relay.register();

        for frame in [
            r#"{"type":"ping"}"#,
            r#"{"type":"chat","content":"no session"}"#,
            r#"{"type":"chat","sessionId":"s1"}"#,
            r#"{"type":"chat","sessionId":"s1","content":""}"#,
            r#"{"type":"chat","sessionId":42,"content":"x"}"#,
            r#"[1,2,3]"#,
        ] {
            relay.handle_frame(&a, frame).await;
        }

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(store.stats().unwrap().messages, 0);
    }

    #[tokio::test]
    async fn test_broadcast_skips_closed_connection() {
        let (relay, _) = make_relay();
        let (a, mut rx_a) = relay.register();
        let (_b, rx_b) = relay.register();
        drop(rx_b);

        relay
            .handle_frame(&a, r#"{"type":"chat","sessionId":"s1","content":"weather"}"#)
            .await;
        assert_eq!(drain(&mut rx_a).len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_connection_receives_nothing() {
        let (relay, _) = make_relay();
        let (a, mut rx_a) = relay.register();
        let (b, mut rx_b) = relay.register();
        relay.unregister(&b);

        relay
            .handle_frame(&a, r#"{"type":"chat","sessionId":"s1","content":"hello"}"#)
            .await;
        assert_eq!(drain(&mut rx_a).len(), 2);
        assert!(drain(&mut rx_b).is_empty());
    }
}
