//! Completion gateway.
//!
//! Produces an assistant reply for any user text. Calls the hosted provider
//! when one is configured and answers from the [`FallbackResponder`] when it
//! is absent or fails. Callers never see a provider error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use parley_core::config::CompletionConfig;

use crate::error::ChatError;
use crate::fallback::FallbackResponder;
use crate::provider::{CompletionProvider, CompletionRequest, GeminiProvider};

/// Reply used when the provider answers successfully but with no text.
pub const EMPTY_REPLY: &str = "I'm sorry, I couldn't process that request right now.";

/// Structured reading of a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentAnalysis {
    pub intent: String,
    pub entities: Vec<String>,
    pub needs_action: bool,
}

impl Default for IntentAnalysis {
    fn default() -> Self {
        Self {
            intent: "general".to_string(),
            entities: Vec::new(),
            needs_action: false,
        }
    }
}

fn voice_prompt(user_text: &str) -> String {
    format!(
        "You are an intelligent AI voice assistant. Respond naturally and conversationally.\n\
         \n\
         Guidelines:\n\
         - Keep responses concise (1-3 sentences max for voice)\n\
         - Be helpful, friendly, and engaging\n\
         - If asked about capabilities, mention: weather, web search, email, time, reminders, notes\n\
         - Use natural speech patterns suitable for text-to-speech\n\
         - Avoid markdown or special formatting\n\
         \n\
         User: \"{}\"",
        user_text
    )
}

fn intent_prompt(user_text: &str) -> String {
    format!(
        "Analyze this user message and identify the intent, entities, and if it needs an action.\n\
         \n\
         User message: \"{}\"\n\
         \n\
         Respond with JSON in this exact format:\n\
         {{\n  \"intent\": \"weather|time|email|search|general|greeting|help\",\n  \"entities\": [\"extracted entities\"],\n  \"needsAction\": true/false\n}}",
        user_text
    )
}

pub struct CompletionGateway {
    provider: Option<Arc<dyn CompletionProvider>>,
    fallback: FallbackResponder,
}

impl CompletionGateway {
    pub fn new(provider: Arc<dyn CompletionProvider>, fallback: FallbackResponder) -> Self {
        Self {
            provider: Some(provider),
            fallback,
        }
    }

    /// Gateway without a provider. Every reply comes from `fallback`.
    pub fn fallback_only(fallback: FallbackResponder) -> Self {
        Self {
            provider: None,
            fallback,
        }
    }

    /// Build from configuration. A missing credential is not an error: the
    /// gateway runs in fallback-only mode.
    pub fn from_config(config: &CompletionConfig) -> Self {
        match GeminiProvider::from_config(config) {
            Ok(provider) => {
                info!(model = %config.model, "Completion provider configured");
                Self::new(Arc::new(provider), FallbackResponder::new())
            }
            Err(ChatError::MissingCredential) => {
                info!("No completion credential, using fallback responses");
                Self::fallback_only(FallbackResponder::new())
            }
            Err(e) => {
                warn!(error = %e, "Failed to build completion provider, using fallback responses");
                Self::fallback_only(FallbackResponder::new())
            }
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Reply to `user_text`. Never fails.
    pub async fn complete(&self, user_text: &str) -> String {
        let Some(provider) = &self.provider else {
            return self.fallback.respond(user_text);
        };

        let request = CompletionRequest::text(voice_prompt(user_text));
        match provider.generate(&request).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Completion failed, using fallback");
                self.fallback.respond(user_text)
            }
        }
    }

    /// Classify `user_text`. Any failure yields [`IntentAnalysis::default`].
    pub async fn analyze_intent(&self, user_text: &str) -> IntentAnalysis {
        let Some(provider) = &self.provider else {
            return IntentAnalysis::default();
        };

        let request = CompletionRequest::json(intent_prompt(user_text));
        match provider.generate(&request).await {
            Ok(text) if text.trim().is_empty() => IntentAnalysis::default(),
            Ok(text) => match serde_json::from_str::<IntentAnalysis>(&text) {
                Ok(analysis) => analysis,
                Err(e) => {
                    debug!(error = %e, "Intent response was not valid JSON");
                    IntentAnalysis::default()
                }
            },
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Intent analysis failed");
                IntentAnalysis::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider returning a fixed outcome and recording prompts.
    struct StubProvider {
        outcome: Result<String, ()>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl StubProvider {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, request: &CompletionRequest) -> Result<String, ChatError> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcome.clone().map_err(|_| ChatError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    fn pinned_fallback() -> FallbackResponder {
        FallbackResponder::with_selector(Arc::new(|_| 0))
    }

    #[tokio::test]
    async fn test_complete_uses_provider() {
        let provider = StubProvider::ok("Sunny and warm.");
        let gateway = CompletionGateway::new(provider.clone(), pinned_fallback());
        assert!(gateway.has_provider());

        let reply = gateway.complete("weather?").await;
        assert_eq!(reply, "Sunny and warm.");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].json_response);
        assert!(requests[0].prompt.contains("User: \"weather?\""));
        assert!(requests[0].prompt.contains("1-3 sentences"));
    }

    #[tokio::test]
    async fn test_complete_empty_reply() {
        let gateway = CompletionGateway::new(StubProvider::ok("   "), pinned_fallback());
        assert_eq!(gateway.complete("anything").await, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn test_complete_falls_back_on_error() {
        let provider = StubProvider::failing();
        let gateway = CompletionGateway::new(provider.clone(), pinned_fallback());
        let reply = gateway.complete("what's the weather").await;
        assert!(reply.contains("weather"));
        assert_eq!(provider.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_without_provider() {
        let gateway = CompletionGateway::fallback_only(pinned_fallback());
        assert!(!gateway.has_provider());
        assert!(gateway.complete("hello").await.starts_with("Hello!"));

        let echo = gateway.complete("violet submarine").await;
        assert!(echo.contains("violet submarine"));
    }

    #[tokio::test]
    async fn test_analyze_intent_parses_json() {
        let provider = StubProvider::ok(
            r#"{"intent":"weather","entities":["Paris"],"needsAction":true}"#,
        );
        let gateway = CompletionGateway::new(provider.clone(), pinned_fallback());
        let analysis = gateway.analyze_intent("weather in Paris").await;
        assert_eq!(
            analysis,
            IntentAnalysis {
                intent: "weather".to_string(),
                entities: vec!["Paris".to_string()],
                needs_action: true,
            }
        );
        assert!(provider.requests.lock().unwrap()[0].json_response);
    }

    #[tokio::test]
    async fn test_analyze_intent_defaults() {
        let fallback_only = CompletionGateway::fallback_only(pinned_fallback());
        assert_eq!(
            fallback_only.analyze_intent("x").await,
            IntentAnalysis::default()
        );

        let failing = CompletionGateway::new(StubProvider::failing(), pinned_fallback());
        assert_eq!(failing.analyze_intent("x").await, IntentAnalysis::default());

        let garbage = CompletionGateway::new(StubProvider::ok("not json"), pinned_fallback());
        assert_eq!(garbage.analyze_intent("x").await, IntentAnalysis::default());

        let empty = CompletionGateway::new(StubProvider::ok(""), pinned_fallback());
        assert_eq!(empty.analyze_intent("x").await, IntentAnalysis::default());
    }

    #[test]
    fn test_intent_analysis_wire_shape() {
        let json = serde_json::to_value(IntentAnalysis::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"intent": "general", "entities": [], "needsAction": false})
        );
    }

    #[test]
    fn test_from_config_without_credential() {
        let config = CompletionConfig {
            api_key: None,
            api_key_env: "PARLEY_GATEWAY_TEST_UNSET_KEY".to_string(),
            ..CompletionConfig::default()
        };
        assert!(!CompletionGateway::from_config(&config).has_provider());
    }
}
