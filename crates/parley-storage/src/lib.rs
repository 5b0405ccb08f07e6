//! Parley Storage crate - in-memory session, message and settings store.
//!
//! Everything lives for the lifetime of the process: no eviction, no
//! persistence. The relay is the only writer of messages.

pub mod store;

pub use store::{SessionStore, StoreStats};
