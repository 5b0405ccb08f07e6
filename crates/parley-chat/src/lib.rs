//! Assistant side of Parley.
//!
//! Provides the completion gateway (hosted model with a keyword-matched
//! fallback), intent analysis, and the voice I/O adapters used by clients.

pub mod error;
pub mod fallback;
pub mod gateway;
pub mod provider;
pub mod voice;

pub use error::{ChatError, VoiceError};
pub use fallback::{FallbackResponder, FallbackRule, IndexSelector};
pub use gateway::{CompletionGateway, IntentAnalysis};
pub use provider::{CompletionProvider, CompletionRequest, GeminiProvider};
pub use voice::{
    RecognitionEngine, SpeechSynthesizer, SynthesisEngine, Utterance, VoiceInfo, VoiceRecognizer,
};
