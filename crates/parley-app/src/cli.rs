//! CLI argument definitions for the Parley application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley - a voice chat relay with a hosted-model assistant.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start the HTTP and WebSocket server (default).
    Serve {
        /// Port to listen on.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
        /// Address to bind.
        #[arg(long = "host")]
        host: Option<String>,
    },
    /// Chat with the assistant from the terminal.
    Chat {
        /// Server base URL, e.g. http://127.0.0.1:5000.
        #[arg(short = 's', long = "server")]
        server: Option<String>,
        /// User whose session and settings are used.
        #[arg(short = 'u', long = "user")]
        user: Option<String>,
        /// Speak assistant replies aloud.
        #[arg(long = "speak")]
        speak: bool,
        /// Preferred synthesis voice.
        #[arg(long = "voice")]
        voice: Option<String>,
    },
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long = "force")]
        force: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve {
            port: None,
            host: None,
        }
    }
}

impl CliArgs {
    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_default()
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLEY_CONFIG env var > ~/.parley/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value > "info".
    pub fn resolve_log_level(&self, config_level: Option<&str>) -> String {
        self.log_level
            .clone()
            .or_else(|| config_level.filter(|l| !l.is_empty()).map(str::to_string))
            .unwrap_or_else(|| "info".to_string())
    }
}

/// Resolve the server port.
///
/// Priority: --port flag > PARLEY_PORT env var > config file value > 5000.
pub fn resolve_port(flag: Option<u16>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Ok(val) = std::env::var("PARLEY_PORT") {
        if let Ok(p) = val.parse::<u16>() {
            return p;
        }
    }
    if config_port != 0 {
        return config_port;
    }
    5000
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    PathBuf::from("config.toml")
}
