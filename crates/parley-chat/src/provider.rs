//! External completion capability.
//!
//! The gateway talks to a [`CompletionProvider`]. [`GeminiProvider`] is the
//! production implementation, calling the Gemini `generateContent` REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::config::CompletionConfig;

use crate::error::ChatError;

/// One prompt sent to the completion capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Ask the model to answer with a JSON document.
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            json_response: false,
        }
    }

    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            json_response: true,
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate the reply text for `request`. An empty string is a valid
    /// (empty) reply.
    async fn generate(&self, request: &CompletionRequest) -> Result<String, ChatError>;
}

// ---------------------------------------------------------------------------
// Gemini wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Schema Gemini is asked to follow for intent analysis.
fn intent_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "intent": { "type": "string" },
            "entities": { "type": "array", "items": { "type": "string" } },
            "needsAction": { "type": "boolean" }
        },
        "required": ["intent", "entities", "needsAction"]
    })
}

fn build_body(request: &CompletionRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: request.prompt.clone(),
            }],
        }],
        generation_config: request.json_response.then(|| GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: Some(intent_schema()),
        }),
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, ChatError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        return Ok(String::new());
    };

    Ok(candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default())
}

/// Completion provider backed by the Gemini REST API.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: endpoint.into(),
        })
    }

    /// Build a provider from configuration. Fails with
    /// [`ChatError::MissingCredential`] when no key is configured.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, ChatError> {
        let api_key = config
            .resolve_api_key()
            .ok_or(ChatError::MissingCredential)?;
        Self::new(
            api_key,
            config.model.clone(),
            config.endpoint.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        let body = build_body(request);
        debug!(model = %self.model, json = request.json_response, "Sending completion request");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_body_text() {
        let body = build_body(&CompletionRequest::text("Hello there"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello there");
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_build_body_json_response() {
        let body = build_body(&CompletionRequest::json("Analyze"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            json["generationConfig"]["responseSchema"]["required"][2],
            "needsAction"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hi "},{"text":"there"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Hi there");
    }

    #[test]
    fn test_extract_text_no_candidates_is_empty() {
        assert_eq!(extract_text(r#"{"candidates":[]}"#).unwrap(), "");
        assert_eq!(extract_text("{}").unwrap(), "");
        assert_eq!(extract_text(r#"{"candidates":[{}]}"#).unwrap(), "");
    }

    #[test]
    fn test_extract_text_malformed() {
        let err = extract_text("not json").unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(_)));
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let provider = GeminiProvider::new(
            "key",
            "gemini-2.5-flash",
            "https://example.test/v1beta/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            provider.url(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_from_config_without_key() {
        let config = CompletionConfig {
            api_key: None,
            api_key_env: "PARLEY_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..CompletionConfig::default()
        };
        assert!(matches!(
            GeminiProvider::from_config(&config),
            Err(ChatError::MissingCredential)
        ));
    }

    #[test]
    fn test_from_config_with_key() {
        let config = CompletionConfig {
            api_key: Some("abc".to_string()),
            ..CompletionConfig::default()
        };
        let provider = GeminiProvider::from_config(&config).unwrap();
        assert_eq!(provider.api_key, "abc");
        assert_eq!(provider.model, config.model);
    }
}
