use serde::{Deserialize, Serialize};

/// The body of a `POST /chat` request.
///
/// The endpoint correlates turns by `session_id`; it is up to the caller to
/// keep it stable for the lifetime of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The text the user typed.
    pub user_query: String,

    /// Opaque identifier of the conversation.
    pub session_id: String,
}

impl ChatRequest {
    /// Creates a new request for the given query and session.
    pub fn new(user_query: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            session_id: session_id.into(),
        }
    }
}
