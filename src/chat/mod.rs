//! Chat sessions and their terminal front end.
//!
//! The heart of this module is [`ChatSession`], which owns one
//! conversation: its message log, its loading flag and its session id.  The
//! rest is presentation for the `parley-chat` binary.
//!
//! # Architecture
//!
//! - [`session`]: the conversation state and the request/response exchange
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing
//! - [`render`]: header, message, typing indicator and notification output

mod commands;
mod config;
mod render;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use render::{PlainTextRenderer, Renderer};
pub use session::{
    ChatSession, Notifier, PLACEHOLDER_REPLY, SessionStats, SilentNotifier, generate_session_id,
};
