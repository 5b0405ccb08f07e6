//! Parley client library.
//!
//! [`SessionController`] keeps one WebSocket connection to the relay alive,
//! reconnecting at a fixed interval, and records every message broadcast to
//! it. [`ApiClient`] wraps the REST endpoints.

pub mod api;
pub mod controller;
pub mod error;
pub mod transport;

pub use api::{ApiClient, ServerStatus};
pub use controller::{ControllerEvent, SessionController};
pub use error::ClientError;
pub use transport::{Connection, Connector, TransportEvent, WsConnector};
