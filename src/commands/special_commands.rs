//! Special commands parser for interactive chat mode
//!
//! Special commands act on the local session rather than being sent to the
//! assistant:
//! - Reset the conversation
//! - Print the transcript
//! - Show session status
//! - Display help information
//! - Exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an argument it does not take
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Clear the conversation here and on the assistant service
    Reset,

    /// Print the whole conversation
    History,

    /// Show session id, state, and message count
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent as a regular message.
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with "/" but is not
/// a valid command, and `CommandError::UnsupportedArgument` if a command is
/// given an argument.
///
/// # Examples
///
/// ```
/// use milo::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/reset").unwrap(), SpecialCommand::Reset);
/// assert_eq!(parse_special_command("quit").unwrap(), SpecialCommand::Exit);
/// assert_eq!(
///     parse_special_command("What does baggage cover?").unwrap(),
///     SpecialCommand::None
/// );
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // If input doesn't start with "/", it's not a command (except exit/quit)
    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    match lower.as_str() {
        "/reset" | "/clear" | "/new" => Ok(SpecialCommand::Reset),
        "/history" | "/transcript" => Ok(SpecialCommand::History),
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        input if input.contains(char::is_whitespace) => {
            let mut parts = input.splitn(2, char::is_whitespace);
            let command = parts.next().unwrap_or_default();
            let arg = parts.next().unwrap_or_default().trim();
            match command {
                "/reset" | "/clear" | "/new" | "/history" | "/transcript" | "/status"
                | "/help" | "/exit" | "/quit" => Err(CommandError::UnsupportedArgument {
                    command: command.to_string(),
                    arg: arg.to_string(),
                }),
                _ => Err(CommandError::UnknownCommand(command.to_string())),
            }
        }

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help for the interactive session
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

CONVERSATION:
  /reset          - Start over (also asks the assistant to forget)
  /clear, /new    - Same as /reset
  /history        - Print the whole conversation

SESSION INFORMATION:
  /status         - Show session id, state, and message count
  /help           - Show this help message
  exit, quit      - Leave the chat (the conversation is kept)

Anything else is sent to Milo. Mention that you want to buy a policy to
get the checkout link.
"#
    );
}
