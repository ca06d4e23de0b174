//! Command-line interface definition for Milo
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting and inspecting stored sessions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Milo - travel insurance assistant client
///
/// Chat with the Milo assistant service, buy a policy, and keep the
/// conversation across restarts.
#[derive(Parser, Debug, Clone)]
#[command(name = "milo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the assistant service base URL
    #[arg(long, env = "MILO_SERVICE_URL")]
    pub service_url: Option<String>,

    /// Override the session database directory
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Milo
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive conversation
    Chat {
        /// Session to open (defaults to the configured session id)
        #[arg(short, long)]
        session: Option<String>,

        /// Address the checkout flow returned to, carrying the payment marker
        #[arg(short, long)]
        return_url: Option<String>,
    },

    /// Print the stored transcript of a session
    History {
        /// Session to print (defaults to the configured session id)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// List stored sessions
    Sessions,

    /// Delete a stored session from this device
    Clear {
        /// Session to delete (defaults to the configured session id)
        #[arg(short, long)]
        session: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
