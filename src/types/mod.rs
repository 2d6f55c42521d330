// Public modules
pub mod chat_reply;
pub mod chat_request;
pub mod message;
pub mod notification;

// Re-exports
pub use chat_reply::ChatReply;
pub use chat_request::ChatRequest;
pub use message::{Message, MessageId};
pub use notification::{Notification, NotificationKind};
