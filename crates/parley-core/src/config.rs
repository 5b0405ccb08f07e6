use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml` by default. The server reads
/// `general`, `server` and `completion`; the terminal client reads `client`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParleyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP + WebSocket listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port for both the REST API and the `/ws` endpoint.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Hosted completion capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// API key. When empty, the environment variable named by
    /// `api_key_env` is consulted instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model identifier passed to the `generateContent` endpoint.
    pub model: String,
    /// Base URL of the generative language API.
    pub endpoint: String,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl CompletionConfig {
    /// Resolve the credential: config value first, then the environment.
    ///
    /// Blank values count as absent. `None` means the fallback responder
    /// handles every request.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

/// Terminal client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base HTTP URL of the relay server. The WebSocket URL is derived from it.
    pub server_url: String,
    /// User whose settings and sessions the client uses.
    pub user_id: String,
    /// Fixed delay between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Speak assistant replies aloud.
    pub speak_replies: bool,
    /// Preferred synthesis voice name. Empty selects automatically.
    pub voice: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            user_id: "default-user".to_string(),
            reconnect_delay_ms: 3000,
            speak_replies: false,
            voice: String::new(),
        }
    }
}

impl ClientConfig {
    /// WebSocket endpoint derived from `server_url` (`http` -> `ws`,
    /// `https` -> `wss`, path `/ws`).
    pub fn websocket_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.completion.model, "gemini-2.5-flash");
        assert_eq!(config.completion.api_key_env, "GEMINI_API_KEY");
        assert!(config.completion.api_key.is_none());
        assert_eq!(config.client.reconnect_delay_ms, 3000);
        assert_eq!(config.client.user_id, "default-user");
        assert!(!config.client.speak_replies);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080

[completion]
api_key = "abc"
model = "gemini-2.0-flash"
request_timeout_secs = 5

[client]
server_url = "https://chat.example.com"
reconnect_delay_ms = 500
speak_replies = true
voice = "en-us"
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.completion.api_key.as_deref(), Some("abc"));
        assert_eq!(config.completion.model, "gemini-2.0-flash");
        assert_eq!(config.completion.request_timeout_secs, 5);
        assert_eq!(config.client.reconnect_delay_ms, 500);
        assert!(config.client.speak_replies);
        assert_eq!(config.client.voice, "en-us");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[server]
port = 9000
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.client.reconnect_delay_ms, 3000);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ParleyConfig::load_or_default(Path::new("/nonexistent/parley.toml"));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is [not valid toml");
        let result = ParleyConfig::load(file.path());
        assert!(matches!(result, Err(ParleyError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ParleyConfig::default();
        config.server.port = 7777;
        config.client.user_id = "alice".to_string();
        config.save(&path).unwrap();

        let reloaded = ParleyConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 7777);
        assert_eq!(reloaded.client.user_id, "alice");
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.completion.request_timeout_secs, 30);
    }

    #[test]
    fn test_resolve_api_key_prefers_config_value() {
        let config = CompletionConfig {
            api_key: Some("from-config".to_string()),
            api_key_env: "PARLEY_TEST_KEY_UNUSED".to_string(),
            ..CompletionConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_resolve_api_key_blank_is_absent() {
        let config = CompletionConfig {
            api_key: Some("   ".to_string()),
            api_key_env: "PARLEY_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..CompletionConfig::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn test_websocket_url_derivation() {
        let mut client = ClientConfig::default();
        assert_eq!(client.websocket_url(), "ws://127.0.0.1:5000/ws");

        client.server_url = "https://chat.example.com/".to_string();
        assert_eq!(client.websocket_url(), "wss://chat.example.com/ws");

        client.server_url = "ws://already.example:1/".to_string();
        assert_eq!(client.websocket_url(), "ws://already.example:1/ws");
    }
}
