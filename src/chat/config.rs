//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration used to build a client and session.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{ChatClient, DEFAULT_API_URL};
use crate::error::Result;

/// Command-line arguments for the parley-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat API.
    #[arrrg(optional, "Base URL of the chat API (default: http://localhost:8000)", "URL")]
    pub api_url: Option<String>,

    /// Client-side timeout for each exchange, in seconds.
    #[arrrg(optional, "Give up on a reply after SECONDS (default: never)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL; requests go to `{api_url}/chat`.
    pub api_url: String,

    /// Optional client-side timeout.  `None` leaves it to the transport.
    pub timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - API URL: http://localhost:8000
    /// - Timeout: none
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
            use_color: true,
        }
    }

    /// Sets the API base URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the client-side timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Builds the HTTP client this configuration describes.
    pub fn client(&self) -> Result<ChatClient> {
        ChatClient::with_options(&self.api_url, self.timeout)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            api_url: args
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: args.timeout.map(Duration::from_secs),
            use_color: !args.no_color,
        }
    }
}
