//! Slash command parsing for the chat application.
//!
//! Input starting with `/` controls the session instead of being sent to the
//! assistant.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Show the session identifier.
    Session,

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a regular message.
///
/// # Examples
///
/// ```
/// # use parley::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let body = input.strip_prefix('/')?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match (command.as_str(), argument) {
        ("clear", None) => ChatCommand::Clear,
        ("session", None) => ChatCommand::Session,
        ("stats" | "status", None) => ChatCommand::Stats,
        ("help" | "?", None) => ChatCommand::Help,
        ("quit" | "exit" | "q", None) => ChatCommand::Quit,
        ("clear" | "session" | "stats" | "status" | "help" | "?" | "quit" | "exit" | "q", Some(_)) => {
            ChatCommand::Invalid(format!("/{command} takes no arguments"))
        }
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                 Clear conversation history
  /session               Show the session id
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat"#
}
