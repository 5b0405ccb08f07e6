//! HTTP helper for the relay's REST endpoints.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use parley_core::types::{ChatSession, Message, SettingsUpdate, UserSettings};

use crate::error::ClientError;

/// Body of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub features: Vec<String>,
}

#[derive(Deserialize)]
struct SessionBody {
    session: ChatSession,
}

#[derive(Deserialize)]
struct MessagesBody {
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct SettingsBody {
    settings: UserSettings,
}

#[derive(Deserialize)]
struct ChatBody {
    response: String,
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL built from path segments. Each segment is
    /// percent-encoded, so ids containing `/`, `?` or `#` stay one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ClientError::Http(format!("invalid server url {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Http(format!("server url {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let path = response.url().path().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!(
                "{} returned {}: {}",
                path, status, body
            )));
        }
        Ok(response.json::<T>().await?)
    }

    /// Create a session owned by `user_id`, or the default user.
    pub async fn create_session(&self, user_id: Option<&str>) -> Result<ChatSession, ClientError> {
        let body = match user_id {
            Some(user_id) => serde_json::json!({ "userId": user_id }),
            None => serde_json::json!({}),
        };
        let url = self.endpoint(&["api", "chat-session"])?;
        let response = self.client.post(url).json(&body).send().await?;
        Ok(Self::read::<SessionBody>(response).await?.session)
    }

    pub async fn messages(&self, session_id: &str) -> Result<Vec<Message>, ClientError> {
        let url = self.endpoint(&["api", "messages", session_id])?;
        let response = self.client.get(url).send().await?;
        Ok(Self::read::<MessagesBody>(response).await?.messages)
    }

    pub async fn settings(&self, user_id: &str) -> Result<UserSettings, ClientError> {
        let url = self.endpoint(&["api", "settings", user_id])?;
        let response = self.client.get(url).send().await?;
        Ok(Self::read::<SettingsBody>(response).await?.settings)
    }

    pub async fn update_settings(
        &self,
        user_id: &str,
        update: &SettingsUpdate,
    ) -> Result<UserSettings, ClientError> {
        let url = self.endpoint(&["api", "settings", user_id])?;
        let response = self.client.post(url).json(update).send().await?;
        Ok(Self::read::<SettingsBody>(response).await?.settings)
    }

    pub async fn status(&self) -> Result<ServerStatus, ClientError> {
        let url = self.endpoint(&["api", "status"])?;
        let response = self.client.get(url).send().await?;
        Self::read(response).await
    }

    /// One synchronous reply. Nothing is stored server side.
    pub async fn chat(&self, message: &str, session_id: &str) -> Result<String, ClientError> {
        let body = serde_json::json!({ "message": message, "sessionId": session_id });
        let url = self.endpoint(&["api", "chat"])?;
        let response = self.client.post(url).json(&body).send().await?;
        Ok(Self::read::<ChatBody>(response).await?.response)
    }
}
