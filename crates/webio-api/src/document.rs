// Wire types for the module's state document.
//
// The module answers every request with one flat JSON object mapping
// channel addresses to values. Firmware sends strings, but numbers and
// booleans are accepted so hand-written documents load cleanly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The full state of a module: address -> value as received.
pub type StateDocument = BTreeMap<String, RawValue>;

/// One channel value exactly as it appeared in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// The string form sent as a query parameter value.
    ///
    /// Booleans travel as `"1"`/`"0"`; everything else as its plain text.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for RawValue {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Parse a state document, keeping the raw body on failure.
pub fn parse_document(body: &str) -> Result<StateDocument, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

/// Serialize a document back to the module's JSON shape.
pub fn render_document(doc: &StateDocument) -> String {
    // A string-keyed map of untagged scalars cannot fail to serialize.
    serde_json::to_string(doc).unwrap_or_default()
}
