//! Voice I/O adapters.
//!
//! [`VoiceRecognizer`] turns speech into a transcript and
//! [`SpeechSynthesizer`] reads replies aloud. Both delegate to pluggable
//! engines so the terminal client can run on whatever the host provides.

pub mod console;
pub mod espeak;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::VoiceError;

pub use console::ConsoleRecognition;
pub use espeak::EspeakSynthesis;

/// A voice offered by a synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP 47 style language tag, e.g. `en-US`.
    pub lang: String,
}

/// One configured piece of speech.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Speaking rate multiplier, 1.0 is normal.
    pub rate: f32,
    /// Pitch multiplier, 1.0 is normal.
    pub pitch: f32,
    /// Voice name. `None` uses the engine default.
    pub voice: Option<String>,
}

#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    fn is_available(&self) -> bool;

    /// Listen for a single utterance and return its final transcript.
    async fn recognize(&self) -> Result<String, String>;

    /// Ask an in-flight [`recognize`](Self::recognize) to finish early.
    fn stop(&self);
}

#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// Speak `utterance`, resolving when playback completes.
    async fn speak(&self, utterance: &Utterance) -> Result<(), String>;

    fn cancel(&self);
}

// =============================================================================
// Recognition
// =============================================================================

pub struct VoiceRecognizer {
    engine: Option<Arc<dyn RecognitionEngine>>,
    recording: AtomicBool,
}

impl VoiceRecognizer {
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self {
            engine: Some(engine),
            recording: AtomicBool::new(false),
        }
    }

    /// Recognizer for a host without speech recognition.
    pub fn unsupported() -> Self {
        Self {
            engine: None,
            recording: AtomicBool::new(false),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_available())
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Capture one utterance and return its transcript.
    pub async fn start_recording(&self) -> Result<String, VoiceError> {
        let engine = match &self.engine {
            Some(engine) if engine.is_available() => engine,
            _ => return Err(VoiceError::UnsupportedCapability),
        };

        let _recording = RecordingGuard::start(&self.recording);
        engine.recognize().await.map_err(VoiceError::Recognition)
    }

    pub fn stop_recording(&self) {
        if let Some(engine) = &self.engine {
            debug!("Stopping speech recognition");
            engine.stop();
        }
    }
}

/// Holds the recording flag while recognition runs. Clears it on drop so a
/// cancelled `start_recording` future does not leave it set.
struct RecordingGuard<'a>(&'a AtomicBool);

impl<'a> RecordingGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RecordingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Synthesis
// =============================================================================

pub struct SpeechSynthesizer {
    engine: Arc<dyn SynthesisEngine>,
    preferred_voice: Option<String>,
}

impl SpeechSynthesizer {
    pub fn new(engine: Arc<dyn SynthesisEngine>) -> Self {
        Self {
            engine,
            preferred_voice: None,
        }
    }

    /// Prefer the voice called `name`. Blank names are ignored.
    pub fn with_voice(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.preferred_voice = (!name.trim().is_empty()).then_some(name);
        self
    }

    pub async fn voices(&self) -> Vec<VoiceInfo> {
        self.engine.voices().await
    }

    /// Choose a voice: the preferred one if offered, else the first English
    /// voice, else the engine default.
    pub fn select_voice(&self, voices: &[VoiceInfo]) -> Option<String> {
        if let Some(preferred) = &self.preferred_voice {
            if voices.iter().any(|v| &v.name == preferred) {
                return Some(preferred.clone());
            }
        }
        voices
            .iter()
            .find(|v| v.lang.to_ascii_lowercase().starts_with("en"))
            .map(|v| v.name.clone())
    }

    /// Speak `text`. Empty or whitespace-only text succeeds without output.
    /// Non-positive rate or pitch means normal.
    pub async fn speak(&self, text: &str, rate: f32, pitch: f32) -> Result<(), VoiceError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let voices = self.engine.voices().await;
        let utterance = Utterance {
            text: text.to_string(),
            rate: normalize(rate),
            pitch: normalize(pitch),
            voice: self.select_voice(&voices),
        };
        debug!(rate = utterance.rate, pitch = utterance.pitch, voice = ?utterance.voice, "Speaking");

        self.engine
            .speak(&utterance)
            .await
            .map_err(VoiceError::Synthesis)
    }

    pub fn stop(&self) {
        self.engine.cancel();
    }
}

fn normalize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}
