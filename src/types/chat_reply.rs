use serde_json::Value;

use crate::error::{Error, Result};

/// Fields probed for reply text, highest priority first.
pub const REPLY_FIELDS: [&str; 3] = ["output", "response", "message"];

/// A decoded reply from the `/chat` endpoint.
///
/// Endpoints in the wild answer either with a bare JSON string or with an
/// object that carries the text under one of a few conventional keys.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    /// The body was a bare JSON string.
    Text(String),

    /// The body was any other non-null JSON value.
    Structured(Value),
}

impl ChatReply {
    /// Decodes a raw response body.
    ///
    /// Empty bodies, malformed JSON, and a literal `null` are all decode
    /// failures.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Self::from_value(value)
    }

    /// Classifies an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Err(Error::serialization("response body was null", None)),
            Value::String(text) => Ok(ChatReply::Text(text)),
            other => Ok(ChatReply::Structured(other)),
        }
    }

    /// Extracts the text to show the user.
    ///
    /// A bare string is returned verbatim.  Otherwise the first of
    /// [`REPLY_FIELDS`] holding a non-empty value wins; strings are taken as
    /// is and anything else is rendered as compact JSON.  When no field
    /// qualifies the whole body is rendered as compact JSON.
    pub fn text(&self) -> String {
        match self {
            ChatReply::Text(text) => text.clone(),
            ChatReply::Structured(value) => REPLY_FIELDS
                .iter()
                .filter_map(|field| value.get(field))
                .find(|candidate| is_present(candidate))
                .map(render)
                .unwrap_or_else(|| to_json_text(value)),
        }
    }
}

// null, false, 0 and "" do not count as a reply.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => to_json_text(other),
    }
}

// Largest float whose integer value is exact.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Compact JSON with integral floats written without a fraction, so `1.0`
/// renders as `1` the way browsers stringify it.
fn to_json_text(value: &Value) -> String {
    integral_floats(value).to_string()
}

fn integral_floats(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER)
            .map(|f| Value::from(f as i64))
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(integral_floats).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), integral_floats(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
