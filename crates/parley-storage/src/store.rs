//! Session store.
//!
//! Wraps all maps in a single Mutex so the store can be shared between
//! axum handler tasks and WebSocket connections. The lock is never held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use parley_core::error::ParleyError;
use parley_core::types::{ChatSession, Message, Sender, SettingsUpdate, UserSettings};

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, ChatSession>,
    /// Messages grouped by session id, in insertion order.
    messages: HashMap<String, Vec<Message>>,
    settings: HashMap<String, UserSettings>,
    message_count: u64,
}

/// Counters reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub sessions: u64,
    pub messages: u64,
    pub settings: u64,
}

/// In-memory store for chat sessions, messages and user settings.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<StoreInner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a closure with exclusive access to the maps.
    fn with_inner<F, T>(&self, f: F) -> Result<T, ParleyError>
    where
        F: FnOnce(&mut StoreInner) -> T,
    {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| ParleyError::Storage(format!("Store lock poisoned: {}", e)))?;
        Ok(f(&mut inner))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Create and store a new session owned by `user_id`.
    pub fn create_session(&self, user_id: &str) -> Result<ChatSession, ParleyError> {
        let session = ChatSession::new(Some(user_id.to_string()));
        self.with_inner(|inner| {
            inner.sessions.insert(session.id.clone(), session.clone());
        })?;
        debug!(session_id = %session.id, user_id = %user_id, "Chat session created");
        Ok(session)
    }

    /// Look up a session by id.
    pub fn get_session(&self, session_id: &str) -> Result<Option<ChatSession>, ParleyError> {
        self.with_inner(|inner| inner.sessions.get(session_id).cloned())
    }

    /// Refresh `updated_at` of an existing session. Unknown ids are ignored.
    pub fn touch_session(&self, session_id: &str) -> Result<(), ParleyError> {
        self.with_inner(|inner| {
            if let Some(session) = inner.sessions.get_mut(session_id) {
                session.updated_at = Utc::now();
            }
        })
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Store a message, assigning its id and timestamp.
    ///
    /// The session id is not checked against known sessions. A known session
    /// has its `updated_at` refreshed.
    pub fn create_message(
        &self,
        session_id: &str,
        content: &str,
        sender: Sender,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message, ParleyError> {
        self.with_inner(|inner| {
            let entry = inner.messages.entry(session_id.to_string()).or_default();

            // Timestamps within a session never go backwards, even if the
            // wall clock does.
            let mut timestamp = Utc::now();
            if let Some(last) = entry.last() {
                if timestamp < last.timestamp {
                    timestamp = last.timestamp;
                }
            }

            let message = Message {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                content: content.to_string(),
                sender,
                timestamp,
                metadata,
            };
            entry.push(message.clone());
            inner.message_count += 1;

            if let Some(session) = inner.sessions.get_mut(session_id) {
                session.updated_at = timestamp;
            }
            message
        })
    }

    /// All messages of `session_id` in ascending timestamp order.
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, ParleyError> {
        self.with_inner(|inner| inner.messages.get(session_id).cloned().unwrap_or_default())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Stored settings for `user_id`, if any.
    pub fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>, ParleyError> {
        self.with_inner(|inner| inner.settings.get(user_id).cloned())
    }

    /// Create settings with defaults if absent, then merge `update` over them.
    pub fn upsert_settings(
        &self,
        user_id: &str,
        update: &SettingsUpdate,
    ) -> Result<UserSettings, ParleyError> {
        self.with_inner(|inner| {
            let settings = inner
                .settings
                .entry(user_id.to_string())
                .or_insert_with(|| UserSettings::defaults_for(user_id));
            settings.apply(update);
            settings.clone()
        })
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn stats(&self) -> Result<StoreStats, ParleyError> {
        self.with_inner(|inner| StoreStats {
            sessions: inner.sessions.len() as u64,
            messages: inner.message_count,
            settings: inner.settings.len() as u64,
        })
    }
}
