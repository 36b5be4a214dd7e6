//! The JSON envelope written as the whole reply body.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type of every reply.
pub const APPLICATION_JSON_UTF8: &str = "application/json; charset=UTF-8";

/// Fixed value of the envelope's `code` field, independent of the transport status.
pub const ENVELOPE_CODE: u16 = 200;

/// Application error code: a string or a number on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        Self::Text(code.to_owned())
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::Text(code)
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        Self::Number(code)
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        Self::Number(i64::from(code))
    }
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        Self::Number(i64::from(code))
    }
}

/// One entry of the envelope's `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub title: String,
}

/// Reply envelope.
///
/// ```json
/// {"status": true, "code": 200, "data": {}, "errors": [], "html": null}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `false` iff a critical error was escalated.
    pub status: bool,
    /// Always [`ENVELOPE_CODE`].
    pub code: u16,
    /// Array or object of handler data.
    pub data: Value,
    pub errors: Vec<ErrorRecord>,
    /// Captured stray output, if requested and available.
    pub html: Option<String>,
}
