//! Client session controller.
//!
//! Owns at most one connection to the relay at a time. A driver task
//! connects, pumps inbound frames into the local message list, and after any
//! close or failed open waits a fixed delay before trying again. Teardown
//! stops the driver and cancels a pending reconnect.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use parley_core::protocol::{ClientEvent, ServerEvent};
use parley_core::types::Message;

use crate::error::ClientError;
use crate::transport::{Connector, TransportEvent};

/// Default fixed delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Connected,
    Disconnected,
    Message(Message),
}

#[derive(Default)]
struct Shared {
    connected: bool,
    outbound: Option<mpsc::UnboundedSender<String>>,
    messages: Vec<Message>,
}

pub struct SessionController {
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<ControllerEvent>,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// Start the driver task. It connects immediately.
    pub fn spawn<C: Connector>(connector: C, reconnect_delay: Duration) -> Self {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (events, _) = broadcast::channel(256);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let driver = Driver {
            connector,
            reconnect_delay,
            shared: Arc::clone(&shared),
            events: events.clone(),
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(driver.run());

        Self {
            shared,
            events,
            shutdown,
            driver: Mutex::new(Some(handle)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().map(|s| s.connected).unwrap_or(false)
    }

    /// Messages received so far, in arrival order.
    pub fn messages(&self) -> Vec<Message> {
        self.shared
            .lock()
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Send a chat event over the open connection.
    ///
    /// Fails with [`ClientError::NotConnected`] when no connection is open.
    /// Nothing is queued for later delivery.
    pub fn send_message(
        &self,
        session_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), ClientError> {
        let event = ClientEvent::Chat {
            session_id: session_id.to_string(),
            content: content.to_string(),
            metadata,
        };
        let frame = serde_json::to_string(&event)?;

        let shared = self
            .shared
            .lock()
            .map_err(|e| ClientError::Transport(format!("Controller state poisoned: {}", e)))?;
        let outbound = match (&shared.outbound, shared.connected) {
            (Some(outbound), true) => outbound,
            _ => {
                error!(session_id = %session_id, "Cannot send message: not connected");
                return Err(ClientError::NotConnected);
            }
        };
        outbound.send(frame).map_err(|_| {
            error!(session_id = %session_id, "Cannot send message: connection closed");
            ClientError::NotConnected
        })
    }

    /// Stop the driver: cancel any pending reconnect, close the active
    /// connection, and wait for the task to finish.
    pub async fn teardown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.driver.lock().ok().and_then(|mut d| d.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Controller driver ended abnormally");
            }
        }
        if let Ok(mut shared) = self.shared.lock() {
            shared.connected = false;
            shared.outbound = None;
        }
    }
}

struct Driver<C> {
    connector: C,
    reconnect_delay: Duration,
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<ControllerEvent>,
    shutdown: watch::Receiver<bool>,
}

impl<C: Connector> Driver<C> {
    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_connection(&self, outbound: Option<mpsc::UnboundedSender<String>>) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.connected = outbound.is_some();
            shared.outbound = outbound;
        }
    }

    async fn run(mut self) {
        while !self.stopping() {
            let attempt = tokio::select! {
                result = self.connector.connect() => Some(result),
                _ = self.shutdown.changed() => None,
            };

            match attempt {
                None => break,
                Some(Ok(connection)) => {
                    info!("Connected to relay");
                    self.set_connection(Some(connection.outbound));
                    self.emit(ControllerEvent::Connected);

                    let stopped = self.pump(connection.inbound).await;
                    self.set_connection(None);
                    if stopped {
                        break;
                    }
                    self.emit(ControllerEvent::Disconnected);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to connect to relay");
                    self.set_connection(None);
                    self.emit(ControllerEvent::Disconnected);
                }
            }

            debug!(delay_ms = self.reconnect_delay.as_millis() as u64, "Scheduling reconnect");
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }
        debug!("Controller driver stopped");
    }

    /// Handle inbound events until the connection ends. Returns `true` when
    /// teardown interrupted it.
    async fn pump(&mut self, mut inbound: mpsc::UnboundedReceiver<TransportEvent>) -> bool {
        loop {
            let event = tokio::select! {
                event = inbound.recv() => event,
                _ = self.shutdown.changed() => return true,
            };

            match event {
                Some(TransportEvent::Frame(text)) => self.handle_frame(&text),
                Some(TransportEvent::Closed) | None => {
                    info!("Relay connection closed");
                    return false;
                }
                Some(TransportEvent::Error(e)) => {
                    warn!(error = %e, "Relay connection error");
                    return false;
                }
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<ServerEvent>(text) {
            Ok(ServerEvent::Message { message }) => {
                if let Ok(mut shared) = self.shared.lock() {
                    shared.messages.push(message.clone());
                }
                self.emit(ControllerEvent::Message(message));
            }
            Ok(ServerEvent::Error { message }) => {
                error!(message = %message, "Relay reported an error");
            }
            Err(e) => {
                warn!(error = %e, "Unparsable frame from relay");
            }
        }
    }
}
