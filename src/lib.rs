//! A session-scoped chat client for a single `POST /chat` endpoint.
//!
//! ```no_run
//! use parley::ChatClient;
//! use parley::chat::ChatSession;
//!
//! # async fn demo() -> parley::Result<()> {
//! let session = ChatSession::new(ChatClient::new("http://localhost:8000")?);
//! session.send_message("Hello!").await;
//! for message in session.messages() {
//!     println!("{}: {}", if message.is_user { "you" } else { "bot" }, message.content);
//! }
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{ChatClient, ChatTransport, DEFAULT_API_URL};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use types::*;
