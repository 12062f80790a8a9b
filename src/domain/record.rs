use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Declared type of a field's textual value.
///
/// `String` and `Literal` are stored identically; the distinction only matters
/// to whoever rendered the text upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeHint {
    Boolean,
    Int32,
    Int64,
    Double,
    Datetime,
    String,
    Literal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown type hint '{0}'. Valid hints: boolean, int32, int64, double, datetime, string, literal")]
pub struct TypeHintParseError(pub String);

impl TypeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeHint::Boolean => "boolean",
            TypeHint::Int32 => "int32",
            TypeHint::Int64 => "int64",
            TypeHint::Double => "double",
            TypeHint::Datetime => "datetime",
            TypeHint::String => "string",
            TypeHint::Literal => "literal",
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeHint {
    type Err = TypeHintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "boolean" | "bool" => Ok(TypeHint::Boolean),
            "int32" | "int" => Ok(TypeHint::Int32),
            "int64" => Ok(TypeHint::Int64),
            "double" | "float" => Ok(TypeHint::Double),
            "datetime" => Ok(TypeHint::Datetime),
            "string" => Ok(TypeHint::String),
            "literal" => Ok(TypeHint::Literal),
            _ => Err(TypeHintParseError(s.to_string())),
        }
    }
}

/// A single named value. Dots in `name` express nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub type_hint: TypeHint,
}

impl Field {
    pub fn new(name: impl Into<String>, type_hint: TypeHint, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            type_hint,
        }
    }
}

/// An ordered set of fields produced upstream. Read-only to the delivery path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    fields: Vec<Field>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style append, mostly for tests and the record source.
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        type_hint: TypeHint,
        value: impl Into<String>,
    ) -> Self {
        self.push(Field::new(name, type_hint, value));
        self
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flat `name -> value` view used when a record has to be shown to an operator.
    pub fn rendered(&self) -> RenderedFields<'_> {
        RenderedFields(&self.fields)
    }
}

/// Serializes a record as a flat JSON object of its textual values.
pub struct RenderedFields<'a>(&'a [Field]);

impl Serialize for RenderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_hint_parsing() {
        assert_eq!("int32".parse::<TypeHint>().unwrap(), TypeHint::Int32);
        assert_eq!("INT64".parse::<TypeHint>().unwrap(), TypeHint::Int64);
        assert_eq!("bool".parse::<TypeHint>().unwrap(), TypeHint::Boolean);
        assert_eq!(" datetime ".parse::<TypeHint>().unwrap(), TypeHint::Datetime);
        assert!("uuid".parse::<TypeHint>().is_err());
    }

    #[test]
    fn test_rendered_fields_are_flat_json() {
        let record = LogRecord::new()
            .with_field("HOST", TypeHint::String, "web-1")
            .with_field("meta.pid", TypeHint::Int32, "42");

        let rendered = serde_json::to_string(&record.rendered()).unwrap();
        assert_eq!(rendered, r#"{"HOST":"web-1","meta.pid":"42"}"#);
    }

    #[test]
    fn test_get_returns_first_match() {
        let record = LogRecord::new()
            .with_field("a", TypeHint::String, "1")
            .with_field("a", TypeHint::String, "2");

        assert_eq!(record.get("a").map(|f| f.value.as_str()), Some("1"));
        assert_eq!(record.len(), 2);
        assert!(record.get("b").is_none());
    }
}
