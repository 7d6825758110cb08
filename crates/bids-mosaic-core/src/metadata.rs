//! Key/value metadata appended to the end of a report.

use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// Reasons a metadata argument is rejected
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("expected a JSON object of key/value pairs, found {0}")]
    NotAnObject(&'static str),
}

/// Ordered key/value rows, in the order they appear in the source text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    rows: Vec<(String, String)>,
}

impl MetadataTable {
    /// Parse a JSON object such as `{"Dataset ID": "ds000001"}`.
    ///
    /// String values are taken verbatim; any other value is rendered as
    /// compact JSON (`42`, `true`, `["a","b"]`).
    ///
    /// # Errors
    /// Returns [`MetadataError`] for malformed JSON or a non-object document.
    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(MetadataError::NotAnObject(json_kind(&value)));
        };

        let rows = map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        Ok(Self { rows })
    }

    #[must_use]
    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromStr for MetadataTable {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
