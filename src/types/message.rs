use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

/// Identifier of a message within a session.
///
/// Ids are Unix milliseconds at creation, bumped forward when two messages
/// land in the same millisecond, so they sort in creation order.  On the
/// wire an id is a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    /// Wraps a raw id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Returns the id after `previous` for a message created at `now`.
    pub fn next(previous: Option<MessageId>, now: OffsetDateTime) -> Self {
        let millis = u64::try_from(now.unix_timestamp_nanos() / 1_000_000).unwrap_or(0);
        match previous {
            Some(MessageId(prev)) if prev >= millis => Self(prev.saturating_add(1)),
            _ => Self(millis),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single turn in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique id, increasing in creation order.
    pub id: MessageId,

    /// The text of the turn.
    pub content: String,

    /// True for the human's turn, false for the assistant's.
    pub is_user: bool,

    /// When the message was created.
    #[serde(with = "crate::utils::time")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    /// Creates a message authored by the user.
    pub fn user(id: MessageId, content: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            id,
            content: content.into(),
            is_user: true,
            timestamp,
        }
    }

    /// Creates a message authored by the assistant.
    pub fn assistant(id: MessageId, content: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            id,
            content: content.into(),
            is_user: false,
            timestamp,
        }
    }
}
