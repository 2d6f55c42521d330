//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction for the
//! presentation layer: the header, the message list, the typing indicator
//! and notifications.  The default implementation writes plain text with
//! optional ANSI styling.

use std::io::{self, Stdout, Write};

use crate::types::{Message, Notification, NotificationKind};
use crate::utils::time::clock;

/// ANSI escape code for bold text (used for the header).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for timestamps and the typing indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for the typing indicator).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the user's label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the assistant's label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for destructive notifications).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (used for ordinary notifications).
const ANSI_YELLOW: &str = "\x1b[33m";

/// Returns the cursor to column zero and erases the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

const TYPING_TEXT: &str = "Assistant is typing...";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print the banner shown once at startup.
    fn print_header(&mut self, session_id: &str);

    /// Print the greeting shown while the log is empty.
    fn print_empty_state(&mut self);

    /// Print one message from the log.
    fn print_message(&mut self, message: &Message);

    /// Show the typing indicator.
    fn start_typing(&mut self);

    /// Remove the typing indicator.
    fn finish_typing(&mut self);

    /// Print a notification raised by the session.
    fn print_notification(&mut self, notification: &Notification);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    typing: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            typing: false,
        }
    }

    /// Consumes the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    // Terminal output is best-effort; a closed stdout is not worth aborting over.
    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn style(&self, codes: &str, text: &str) -> String {
        if self.use_color {
            format!("{codes}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_header(&mut self, session_id: &str) {
        let title = self.style(ANSI_BOLD, "AI Assistant");
        let tagline = self.style(ANSI_DIM, "Always here to help");
        let session = self.style(ANSI_DIM, &format!("session {session_id}"));
        self.emit(&format!("{title}  {tagline}\n{session}\n"));
        self.emit("Type /help for commands, /quit to exit\n\n");
    }

    fn print_empty_state(&mut self) {
        let heading = self.style(ANSI_BOLD, "Start a conversation");
        self.emit(&format!(
            "{heading}\nSend a message to begin chatting with the AI assistant. \
             I'm here to help with any questions you have.\n\n"
        ));
    }

    fn print_message(&mut self, message: &Message) {
        self.finish_typing();
        let (label, color) = if message.is_user {
            ("You", ANSI_CYAN)
        } else {
            ("Assistant", ANSI_GREEN)
        };
        let label = self.style(color, label);
        let stamp = self.style(ANSI_DIM, &clock(message.timestamp));
        let mut text = format!("{label} {stamp}\n");
        for line in message.content.lines() {
            text.push_str("  ");
            text.push_str(line);
            text.push('\n');
        }
        if message.content.is_empty() {
            text.push('\n');
        }
        self.emit(&text);
    }

    fn start_typing(&mut self) {
        if self.typing {
            return;
        }
        self.typing = true;
        if self.use_color {
            let text = format!("{ANSI_DIM}{ANSI_ITALIC}{TYPING_TEXT}{ANSI_RESET}");
            self.emit(&text);
        } else {
            self.emit(&format!("[{TYPING_TEXT}]\n"));
        }
    }

    fn finish_typing(&mut self) {
        if !self.typing {
            return;
        }
        self.typing = false;
        if self.use_color {
            self.emit(ANSI_CLEAR_LINE);
        }
    }

    fn print_notification(&mut self, notification: &Notification) {
        self.finish_typing();
        let color = match notification.kind {
            NotificationKind::Default => ANSI_YELLOW,
            NotificationKind::Destructive => ANSI_RED,
        };
        let title = self.style(color, &format!("[{}]", notification.title));
        self.emit(&format!("{title} {}\n", notification.description));
    }

    fn print_error(&mut self, error: &str) {
        self.finish_typing();
        eprintln!("\nError: {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.finish_typing();
        self.emit(&format!("{info}\n"));
    }
}
