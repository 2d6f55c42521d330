//! Timestamp helpers.
//!
//! The module doubles as a `#[serde(with = "crate::utils::time")]` adapter
//! that stores an [`OffsetDateTime`] as an RFC 3339 string.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

/// Deserialize an RFC 3339 formatted string into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// Render a timestamp as `HH:MM` wall-clock time in the local zone.
///
/// Falls back to the timestamp's own offset when the local offset cannot be
/// determined (e.g. on platforms where querying it is unsound once threads
/// have been spawned).
pub fn clock(datetime: OffsetDateTime) -> String {
    match UtcOffset::current_local_offset() {
        Ok(offset) => clock_at(datetime, offset),
        Err(_) => clock_at(datetime, datetime.offset()),
    }
}

/// Render a timestamp as `HH:MM` at the given offset.
pub fn clock_at(datetime: OffsetDateTime, offset: UtcOffset) -> String {
    let local = datetime.to_offset(offset);
    format!("{:02}:{:02}", local.hour(), local.minute())
}
