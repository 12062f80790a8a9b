use crate::domain::{Field, LogRecord, TypeHint};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid JSON input: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Input line is not a JSON object")]
    NotAnObject,
}

/// Turns newline-delimited JSON objects into [`LogRecord`]s.
///
/// Nested objects are flattened into dotted names. The hint of each field
/// follows its JSON type unless an override is configured for its full name.
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    overrides: HashMap<String, TypeHint>,
}

impl RecordSource {
    pub fn new(overrides: HashMap<String, TypeHint>) -> Self {
        Self { overrides }
    }

    pub fn parse_line(&self, line: &str) -> Result<LogRecord, SourceError> {
        let value: Value = serde_json::from_str(line)?;
        self.record_from_value(&value)
    }

    pub fn record_from_value(&self, value: &Value) -> Result<LogRecord, SourceError> {
        let Value::Object(object) = value else {
            return Err(SourceError::NotAnObject);
        };

        let mut record = LogRecord::with_capacity(object.len());
        let mut name = String::new();
        self.flatten(object, &mut name, &mut record);
        Ok(record)
    }

    fn flatten(&self, object: &Map<String, Value>, name: &mut String, record: &mut LogRecord) {
        for (key, value) in object {
            let prefix_len = name.len();
            if !name.is_empty() {
                name.push('.');
            }
            name.push_str(key);

            match value {
                Value::Object(nested) => self.flatten(nested, name, record),
                scalar => {
                    if let Some((hint, text)) = scalar_field(scalar) {
                        let hint = self.overrides.get(name.as_str()).copied().unwrap_or(hint);
                        record.push(Field::new(name.clone(), hint, text));
                    }
                }
            }

            name.truncate(prefix_len);
        }
    }
}

fn scalar_field(value: &Value) -> Option<(TypeHint, String)> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::Bool(b) => Some((TypeHint::Boolean, b.to_string())),
        Value::Number(n) if n.is_i64() => Some((TypeHint::Int64, n.to_string())),
        // Beyond i64 range a number cannot be an Int64; keep its digits.
        Value::Number(n) if n.is_u64() => Some((TypeHint::String, n.to_string())),
        Value::Number(n) => Some((TypeHint::Double, n.to_string())),
        Value::String(s) => Some((TypeHint::String, s.clone())),
        Value::Array(_) => Some((TypeHint::String, value.to_string())),
    }
}
