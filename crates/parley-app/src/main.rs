//! Parley application binary - composition root.
//!
//! Ties together the Parley crates into a single executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Install tracing
//! 3. Run the selected subcommand: the relay server, the terminal chat
//!    client, or `init` to write a default config file

mod chat;
mod cli;

use std::path::Path;

use clap::Parser;

use parley_api::routes;
use parley_api::state::AppState;
use parley_core::config::ParleyConfig;
use parley_core::error::ParleyError;

use cli::{CliArgs, Command};

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// Write a default config file. Refuses to overwrite unless `force`.
fn write_default_config(path: &Path, force: bool) -> Result<(), ParleyError> {
    if path.exists() && !force {
        return Err(ParleyError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    ParleyConfig::default().save(path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();

    // Read the configured level before tracing exists; the real load below
    // reports problems once logging is up.
    let configured_level = ParleyConfig::load(&config_file)
        .ok()
        .map(|c| c.general.log_level);
    init_tracing(&args.resolve_log_level(configured_level.as_deref()));

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));

    match args.command() {
        Command::Init { force } => {
            write_default_config(&config_file, force)?;
            println!("Wrote {}", config_file.display());
        }
        Command::Serve { port, host } => {
            let mut config = ParleyConfig::load_or_default(&config_file);
            config.server.port = cli::resolve_port(port, config.server.port);
            if let Some(host) = host {
                config.server.host = host;
            }

            let state = AppState::from_config(config);
            routes::start_server(state).await?;
        }
        Command::Chat {
            server,
            user,
            speak,
            voice,
        } => {
            let mut client = ParleyConfig::load_or_default(&config_file).client;
            if let Some(server) = server {
                client.server_url = server;
            }
            if let Some(user) = user {
                client.user_id = user;
            }
            if let Some(voice) = voice {
                client.voice = voice;
            }
            client.speak_replies |= speak;

            chat::run(client).await?;
        }
    }

    Ok(())
}
