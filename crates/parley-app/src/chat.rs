//! Terminal chat client.
//!
//! Creates a session over HTTP, keeps a relay connection through the session
//! controller, reads dictated or typed lines and prints every broadcast
//! message. Assistant replies can be spoken with the user's voice settings.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use parley_chat::voice::{ConsoleRecognition, EspeakSynthesis};
use parley_chat::{SpeechSynthesizer, VoiceError, VoiceRecognizer};
use parley_client::controller::DEFAULT_RECONNECT_DELAY;
use parley_client::{ApiClient, ControllerEvent, SessionController, WsConnector};
use parley_core::config::ClientConfig;
use parley_core::error::ParleyError;
use parley_core::types::{Sender, UserSettings};

/// Lines that end the chat loop.
const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

pub async fn run(config: ClientConfig) -> Result<(), ParleyError> {
    let api = ApiClient::new(config.server_url.clone());

    let session = api.create_session(Some(&config.user_id)).await?;
    tracing::info!(session_id = %session.id, user_id = %config.user_id, "Chat session created");

    let settings = match api.settings(&config.user_id).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load settings, using defaults");
            UserSettings::defaults_for(&config.user_id)
        }
    };

    let reconnect_delay = match config.reconnect_delay_ms {
        0 => DEFAULT_RECONNECT_DELAY,
        ms => Duration::from_millis(ms),
    };
    let controller = SessionController::spawn(
        WsConnector::new(config.websocket_url()),
        reconnect_delay,
    );

    let synthesizer = config.speak_replies.then(|| {
        let engine = Arc::new(EspeakSynthesis::default());
        Arc::new(SpeechSynthesizer::new(engine).with_voice(config.voice.clone()))
    });
    let printer = tokio::spawn(print_events(
        controller.subscribe(),
        synthesizer,
        settings.speech_rate(),
        settings.speech_pitch(),
    ));

    let recognizer = VoiceRecognizer::new(Arc::new(ConsoleRecognition::stdin()));
    println!("Connected as {}. Speak or type a message, /quit to leave.", config.user_id);

    loop {
        let heard = tokio::select! {
            heard = recognizer.start_recording() => heard,
            _ = tokio::signal::ctrl_c() => {
                recognizer.stop_recording();
                break;
            }
        };

        match heard {
            Ok(text) if QUIT_COMMANDS.contains(&text.as_str()) => break,
            Ok(text) => {
                if controller.send_message(&session.id, &text, None).is_err() {
                    eprintln!("Not connected; message was not sent.");
                }
            }
            Err(VoiceError::Recognition(reason)) if reason == "no-speech" => continue,
            Err(VoiceError::Recognition(reason)) if reason == "end of input" => break,
            Err(e) => {
                tracing::warn!(error = %e, "Speech recognition failed");
                break;
            }
        }
    }

    controller.teardown().await;
    printer.abort();
    Ok(())
}

async fn print_events(
    mut events: tokio::sync::broadcast::Receiver<ControllerEvent>,
    synthesizer: Option<Arc<SpeechSynthesizer>>,
    rate: f32,
    pitch: f32,
) {
    loop {
        match events.recv().await {
            Ok(ControllerEvent::Connected) => eprintln!("[connected]"),
            Ok(ControllerEvent::Disconnected) => eprintln!("[disconnected, retrying]"),
            Ok(ControllerEvent::Message(message)) => {
                let label = match message.sender {
                    Sender::User => "you",
                    Sender::Assistant => "assistant",
                };
                println!("[{}] {}", label, message.content);

                if let (Sender::Assistant, Some(synth)) = (message.sender, &synthesizer) {
                    if let Err(e) = synth.speak(&message.content, rate, pitch).await {
                        tracing::warn!(error = %e, "Failed to speak reply");
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Fell behind on relay events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
