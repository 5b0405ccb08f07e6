//! Route handler functions for all REST endpoints.
//!
//! Each handler extracts path parameters and bodies via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::types::{
    ChatSession, Message, SettingsUpdate, UserSettings, DEFAULT_USER_ID,
};

use crate::error::{ApiError, ValidationIssue};
use crate::state::AppState;

/// Capabilities advertised by `GET /api/status`.
pub const FEATURES: [&str; 8] = [
    "voice_recognition",
    "text_to_speech",
    "weather_info",
    "time_info",
    "web_search",
    "email_sending",
    "reminders",
    "notes",
];

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: ChatSession,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub settings: UserSettings,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub features: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub connections: u64,
    pub sessions: u64,
    pub messages: u64,
}

// =============================================================================
// Sessions and messages
// =============================================================================

/// POST /api/chat-session - create a session. The body is optional.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SessionResponse>, ApiError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let user_id = request
        .user_id
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
    let session = state.store.create_session(&user_id)?;
    Ok(Json(SessionResponse { session }))
}

/// GET /api/messages/{session_id} - session history, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = state.store.list_messages(&session_id)?;
    Ok(Json(MessagesResponse { messages }))
}

// =============================================================================
// Settings
// =============================================================================

/// GET /api/settings/{user_id} - stored settings, or defaults (not stored).
pub async fn get_settings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state
        .store
        .get_settings(&user_id)?
        .unwrap_or_else(|| UserSettings::defaults_for(&user_id));
    Ok(Json(SettingsResponse { settings }))
}

/// POST /api/settings/{user_id} - merge a partial update.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<Json<SettingsResponse>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::Validation(vec![ValidationIssue::new("", "Invalid JSON body")]))?;
    let update = validate_settings_update(&value)?;
    let settings = state.store.upsert_settings(&user_id, &update)?;
    Ok(Json(SettingsResponse { settings }))
}

/// Check field types of a settings body. Null counts as absent.
pub fn validate_settings_update(value: &serde_json::Value) -> Result<SettingsUpdate, ApiError> {
    let Some(object) = value.as_object() else {
        return Err(ApiError::Validation(vec![ValidationIssue::new(
            "",
            "Expected object",
        )]));
    };

    let mut issues = Vec::new();
    let mut string_field = |name: &str| -> Option<String> {
        match object.get(name) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(_) => {
                issues.push(ValidationIssue::new(name, "Expected string"));
                None
            }
        }
    };

    let user_id = string_field("userId");
    let voice_speed = string_field("voiceSpeed");
    let voice_pitch = string_field("voicePitch");
    let theme = string_field("theme");

    let auto_scroll = match object.get("autoScroll") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Bool(b)) => Some(*b),
        Some(_) => {
            issues.push(ValidationIssue::new("autoScroll", "Expected boolean"));
            None
        }
    };

    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }

    Ok(SettingsUpdate {
        user_id,
        voice_speed,
        voice_pitch,
        auto_scroll,
        theme,
    })
}

// =============================================================================
// Status, chat and health
// =============================================================================

/// GET /api/status - fixed liveness and feature list.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        timestamp: Utc::now(),
        features: FEATURES.iter().map(|f| f.to_string()).collect(),
    })
}

/// POST /api/chat - synchronous reply. Nothing is stored or broadcast.
pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body).unwrap_or(ChatRequest {
        message: None,
        session_id: None,
    });

    let message = match (request.message, request.session_id) {
        (Some(message), Some(session_id)) if !message.is_empty() && !session_id.is_empty() => {
            message
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Message and sessionId required".to_string(),
            ))
        }
    };

    let response = state.gateway.complete(&message).await;
    Ok(Json(ChatResponse {
        response,
        timestamp: Utc::now(),
    }))
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let stats = state.store.stats()?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        connections: state.relay.connection_count() as u64,
        sessions: stats.sessions,
        messages: stats.messages,
    }))
}
