//! Parley API crate - axum HTTP server, REST handlers and the WebSocket relay.
//!
//! Serves the chat session, message history, settings, status and
//! synchronous chat endpoints, plus `/ws` where the realtime relay
//! broadcasts every stored message to all connected clients.

pub mod error;
pub mod handlers;
pub mod relay;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use relay::Relay;
pub use routes::{create_router, start_server};
pub use state::AppState;
