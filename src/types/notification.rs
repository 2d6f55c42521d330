/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationKind {
    /// An ordinary confirmation.
    #[default]
    Default,

    /// Something went wrong.
    Destructive,
}

/// A transient, user-visible notice raised by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short headline.
    pub title: String,

    /// One-sentence explanation.
    pub description: String,

    /// Presentation hint.
    pub kind: NotificationKind,
}

impl Notification {
    /// Creates a notification.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind,
        }
    }

    /// Raised whenever an exchange fails, whatever the cause.
    pub fn connection_error() -> Self {
        Self::new(
            "Connection Error",
            "Unable to reach the server. Please ensure the API is running.",
            NotificationKind::Destructive,
        )
    }

    /// Raised whenever the log is cleared.
    pub fn chat_cleared() -> Self {
        Self::new(
            "Chat cleared",
            "Your conversation has been cleared.",
            NotificationKind::Default,
        )
    }

    /// Returns true for destructive notifications.
    pub fn is_destructive(&self) -> bool {
        self.kind == NotificationKind::Destructive
    }
}
