/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`     - Interactive conversation with the assistant
- `history`  - Print a stored transcript
- `sessions` - List stored sessions
- `clear`    - Delete a stored session

The handlers are thin: all conversation logic lives in the session
controller, these only wire it to the terminal.
*/

use crate::config::Config;
use crate::error::Result;
use crate::session::{Message, Role};
use crate::storage::SessionStorage;
use colored::Colorize;

// Special commands parser for the interactive loop
pub mod special_commands;

/// Open the configured session store
pub fn open_storage(config: &Config) -> Result<SessionStorage> {
    match &config.storage.path {
        Some(path) => SessionStorage::new(path),
        None => SessionStorage::open_default(),
    }
}

/// Resolve the session id from a CLI override or the configured default
pub fn resolve_session_id(config: &Config, session: Option<String>) -> String {
    session
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.session.default_session_id.clone())
}

/// Render one message for the terminal
pub fn format_message(message: &Message) -> String {
    match message.role {
        Role::User => format!("{} {}", "You:".bold().cyan(), message.content),
        Role::Assistant => format!("{} {}", "Milo:".bold().green(), message.content),
    }
}

fn print_transcript(messages: &[Message]) {
    println!();
    for message in messages {
        println!("{}", format_message(message));
    }
    println!();
}

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Builds the HTTP client and the session controller, runs startup
    //! (reload plus payment reconciliation), then reads lines with
    //! rustyline until the user exits.

    use super::*;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::service::HttpAssistantClient;
    use crate::session::{
        LoadOutcome, ReconcileOutcome, ResetOutcome, SendOutcome, SessionController,
        SessionState,
    };
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::sync::Arc;
    use url::Url;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `session` - Optional session id override
    /// * `return_url` - Optional address the checkout flow returned to
    pub async fn run_chat(
        config: Config,
        session: Option<String>,
        return_url: Option<String>,
    ) -> Result<()> {
        let session_id = resolve_session_id(&config, session);
        tracing::info!("Starting chat for session {}", session_id);

        let address = match return_url.as_deref().map(Url::parse) {
            Some(Ok(url)) => Some(url),
            Some(Err(e)) => {
                tracing::warn!("Ignoring unparseable return URL: {}", e);
                None
            }
            None => None,
        };

        let storage = open_storage(&config)?;
        let client = Arc::new(HttpAssistantClient::new(config.service.clone())?);
        let controller = SessionController::new(
            session_id,
            &config,
            storage,
            client.clone(),
            client,
        );

        let Some(report) = controller.start(address.as_ref()).await else {
            tracing::warn!("Session {} is busy, not starting", controller.session_id());
            return Ok(());
        };
        if let Some(cleaned) = &report.address {
            tracing::debug!("Address after startup: {}", cleaned);
        }

        print_welcome_banner(&controller, report.restored);
        match report.payment {
            ReconcileOutcome::Confirmed => {
                println!("{}", "Payment confirmed.".green().bold());
            }
            ReconcileOutcome::CheckFailed => {
                tracing::warn!("Could not verify the returning payment");
            }
            _ => {}
        }

        let history = controller.snapshot();
        let shown = history.len().saturating_sub(RECENT_ON_START);
        print_transcript(&history[shown..]);

        let mut rl = DefaultEditor::new()?;

        loop {
            let prompt = format!("{} ", ">".bold());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::Reset) => {
                            handle_reset(&controller).await;
                            continue;
                        }
                        Ok(SpecialCommand::History) => {
                            print_transcript(&controller.snapshot());
                            continue;
                        }
                        Ok(SpecialCommand::ShowStatus) => {
                            print_status(&controller);
                            continue;
                        }
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::None) => {}
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    rl.add_history_entry(trimmed)?;

                    match controller.send(trimmed).await {
                        SendOutcome::Replied(reply) | SendOutcome::PurchaseLink(reply) => {
                            println!("{}\n", format_message(&reply));
                        }
                        SendOutcome::Failed(reply) => {
                            println!("{}\n", format_message(&reply).yellow());
                        }
                        SendOutcome::Rejected => {
                            println!("{}", "Still waiting for the previous reply.".yellow());
                        }
                        SendOutcome::Ignored => {}
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    return Err(e.into());
                }
            }
        }

        println!("Goodbye! Your conversation has been saved.");
        Ok(())
    }

    /// Messages replayed when a stored conversation is reopened
    const RECENT_ON_START: usize = 10;

    async fn handle_reset(controller: &SessionController) {
        match controller.reset().await {
            ResetOutcome::Cleared => {
                println!("{}", "Conversation cleared.".green());
                print_transcript(&controller.snapshot());
            }
            ResetOutcome::LocalOnly { warning } => {
                println!("{}", warning.yellow());
                print_transcript(&controller.snapshot());
            }
            ResetOutcome::Rejected => {
                println!("{}", "Still waiting for the previous reply.".yellow());
            }
        }
    }

    fn print_welcome_banner(controller: &SessionController, restored: LoadOutcome) {
        println!("{}", "Milo - travel insurance assistant".bold());
        println!("Session: {}", controller.session_id().cyan());
        match restored {
            LoadOutcome::Restored(n) => println!("Restored {} earlier messages.", n),
            LoadOutcome::Recovered => println!(
                "{}",
                "The saved conversation could not be read and was started over.".yellow()
            ),
            LoadOutcome::Unavailable => println!(
                "{}",
                "Local storage is unavailable; this conversation will not be saved.".yellow()
            ),
            LoadOutcome::Seeded => {}
        }
        println!("Type '/help' for commands.");
    }

    fn print_status(controller: &SessionController) {
        let state = match controller.state() {
            SessionState::Idle => "idle",
            SessionState::Sending => "sending",
        };
        println!();
        println!("Session:  {}", controller.session_id().cyan());
        println!("State:    {}", state);
        println!("Messages: {}", controller.snapshot().len());
        println!();
    }
}

/// Print the stored transcript of a session
pub fn show_history(config: &Config, session: Option<String>) -> Result<()> {
    let storage = open_storage(config)?;
    let session_id = resolve_session_id(config, session);

    match storage.load_session(&session_id)? {
        Some(messages) if !messages.is_empty() => {
            println!("Conversation {}:", session_id.cyan());
            print_transcript(&messages);
        }
        _ => println!("{}", format!("No conversation stored for {}.", session_id).yellow()),
    }

    Ok(())
}

/// List stored sessions
pub fn list_sessions(config: &Config) -> Result<()> {
    use prettytable::{format, Table};

    let storage = open_storage(config)?;
    let sessions = storage.list_sessions()?;

    if sessions.is_empty() {
        println!("{}", "No stored sessions found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "Session".bold(),
        "Messages".bold(),
        "Last Saved".bold()
    ]);

    for session in sessions {
        let saved = session
            .saved_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(prettytable::row![
            session.id.cyan(),
            session.message_count,
            saved
        ]);
    }

    println!("\nStored Sessions:");
    table.printstd();
    println!();
    println!("Use {} to continue one.", "milo chat --session <ID>".cyan());
    println!();

    Ok(())
}

/// Delete a stored session from this device
pub fn clear_session(config: &Config, session: Option<String>) -> Result<()> {
    let storage = open_storage(config)?;
    let session_id = resolve_session_id(config, session);

    storage.delete_session(&session_id)?;
    println!("{}", format!("Deleted conversation {}", session_id).green());

    Ok(())
}
