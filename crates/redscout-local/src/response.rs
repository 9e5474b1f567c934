//! Read-only view over a raw chat-completions response.
//!
//! The service answers in several shapes that can coexist in one body
//! (`error`, `choices`, `output`, `web_search`). Each accessor checks for its
//! own field and nothing else; precedence between them is decided by the
//! interpreter.

use serde_json::{Map, Value};

/// The top-level `output` field, which some API versions send instead of `choices`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputField<'a> {
    Text(&'a str),
    Blocks(&'a [Value]),
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> ResponseView<'a> {
    /// Returns `None` when the body is not a JSON object.
    pub fn new(body: &'a Value) -> Option<Self> {
        body.as_object().map(|fields| Self { fields })
    }

    pub fn keys(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// The `error` field, only when it is present and non-empty.
    pub fn error(&self) -> Option<&'a Value> {
        self.fields.get("error").filter(|v| is_truthy(v))
    }

    pub fn choices(&self) -> &'a [Value] {
        array_field(self.fields, "choices")
    }

    pub fn output(&self) -> Option<OutputField<'a>> {
        match self.fields.get("output")? {
            Value::String(s) => Some(OutputField::Text(s)),
            Value::Array(blocks) => Some(OutputField::Blocks(blocks)),
            _ => None,
        }
    }

    pub fn web_search(&self) -> &'a [Value] {
        array_field(self.fields, "web_search")
    }
}

fn array_field<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Null, `false`, zero, and empty strings/arrays/objects count as absent.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Human-readable message for an `error` value: its `message` when it has one.
pub fn error_message(error: &Value) -> String {
    match error {
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => error.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
