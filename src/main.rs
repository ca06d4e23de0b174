//! Milo - travel insurance assistant client
//!
#![doc = "Milo - travel insurance assistant client"]
#![doc = "Main entry point for the Milo command-line client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use milo::cli::{Cli, Commands};
use milo::commands;
use milo::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            session,
            return_url,
        } => {
            tracing::info!("Starting interactive chat mode");
            if let Some(s) = &session {
                tracing::debug!("Using session override: {}", s);
            }
            if let Some(r) = &return_url {
                tracing::debug!("Opened from return address: {}", r);
            }

            // Moves `config` into the handler (match arms are exclusive)
            commands::chat::run_chat(config, session, return_url).await?;
            Ok(())
        }
        Commands::History { session } => {
            tracing::info!("Starting history command");
            commands::show_history(&config, session)?;
            Ok(())
        }
        Commands::Sessions => {
            tracing::info!("Listing stored sessions");
            commands::list_sessions(&config)?;
            Ok(())
        }
        Commands::Clear { session } => {
            tracing::info!("Starting clear command");
            commands::clear_session(&config, session)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "milo=debug" } else { "milo=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
