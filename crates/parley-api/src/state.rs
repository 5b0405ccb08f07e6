//! Application state shared across all route handlers.
//!
//! AppState holds references to all services and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use parley_chat::CompletionGateway;
use parley_core::config::ParleyConfig;
use parley_storage::SessionStore;

use crate::relay::Relay;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<ParleyConfig>,
    /// Sessions, messages and settings.
    pub store: Arc<SessionStore>,
    /// Produces assistant replies.
    pub gateway: Arc<CompletionGateway>,
    /// Open WebSocket connections and chat processing.
    pub relay: Arc<Relay>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState. The relay shares the given store and gateway.
    pub fn new(config: ParleyConfig, store: SessionStore, gateway: CompletionGateway) -> Self {
        let store = Arc::new(store);
        let gateway = Arc::new(gateway);
        let relay = Arc::new(Relay::new(Arc::clone(&store), Arc::clone(&gateway)));
        Self {
            config: Arc::new(config),
            store,
            gateway,
            relay,
            start_time: Instant::now(),
        }
    }

    /// State built from configuration: empty store, gateway per the
    /// `[completion]` section.
    pub fn from_config(config: ParleyConfig) -> Self {
        let gateway = CompletionGateway::from_config(&config.completion);
        Self::new(config, SessionStore::new(), gateway)
    }
}
