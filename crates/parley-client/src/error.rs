//! Error types for the client library.

use parley_core::error::ParleyError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected to the relay")]
    NotConnected,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl From<ClientError> for ParleyError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Serialization(e) => ParleyError::Serialization(e.to_string()),
            other => ParleyError::Transport(other.to_string()),
        }
    }
}
