use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User id assigned when a client does not name one.
pub const DEFAULT_USER_ID: &str = "default-user";

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Text typed or dictated by a person.
    User,
    /// Reply produced by the completion gateway.
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Records
// =============================================================================

/// A conversation. Only `updated_at` ever changes after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// A fresh session owned by `user_id`.
    pub fn new(user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single chat message. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// Opaque client-supplied data (tool usage, voice data). Never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Per-user presentation and speech preferences.
///
/// `voice_speed` and `voice_pitch` are kept as strings; consumers parse
/// them with [`UserSettings::speech_rate`] and [`UserSettings::speech_pitch`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub id: String,
    pub user_id: String,
    pub voice_speed: String,
    pub voice_pitch: String,
    pub auto_scroll: bool,
    pub theme: String,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    pub const DEFAULT_VOICE_SPEED: &'static str = "1.0";
    pub const DEFAULT_VOICE_PITCH: &'static str = "1.0";
    pub const DEFAULT_THEME: &'static str = "light";

    /// Default settings for `user_id` with a fresh record id.
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            voice_speed: Self::DEFAULT_VOICE_SPEED.to_string(),
            voice_pitch: Self::DEFAULT_VOICE_PITCH.to_string(),
            auto_scroll: true,
            theme: Self::DEFAULT_THEME.to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Merge the supplied fields of `update` over `self`.
    ///
    /// Absent and empty string fields keep their prior value.
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(speed) = non_empty(&update.voice_speed) {
            self.voice_speed = speed.to_string();
        }
        if let Some(pitch) = non_empty(&update.voice_pitch) {
            self.voice_pitch = pitch.to_string();
        }
        if let Some(auto_scroll) = update.auto_scroll {
            self.auto_scroll = auto_scroll;
        }
        if let Some(theme) = non_empty(&update.theme) {
            self.theme = theme.to_string();
        }
        self.updated_at = Utc::now();
    }

    /// Speech rate as a float, `1.0` when the stored string does not parse.
    pub fn speech_rate(&self) -> f32 {
        parse_or_one(&self.voice_speed)
    }

    /// Speech pitch as a float, `1.0` when the stored string does not parse.
    pub fn speech_pitch(&self) -> f32 {
        parse_or_one(&self.voice_pitch)
    }
}

/// Partial settings update. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    /// Accepted for wire compatibility; the path segment decides the owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_pitch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scroll: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_or_one(value: &str) -> f32 {
    value.trim().parse::<f32>().ok().filter(|v| v.is_finite()).unwrap_or(1.0)
}
