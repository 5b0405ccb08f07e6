//! Error types for the completion gateway and voice adapters.

use parley_core::error::ParleyError;

/// Failures of the external completion capability.
///
/// The gateway never surfaces these to callers; they only decide when the
/// fallback responder takes over.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no completion credential configured")]
    MissingCredential,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("completion API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Http(err.to_string())
    }
}

/// Failures of the voice I/O adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("speech recognition is not supported on this platform")]
    UnsupportedCapability,
    #[error("speech recognition error: {0}")]
    Recognition(String),
    #[error("speech synthesis error: {0}")]
    Synthesis(String),
}

impl From<VoiceError> for ParleyError {
    fn from(err: VoiceError) -> Self {
        ParleyError::Voice(err.to_string())
    }
}
