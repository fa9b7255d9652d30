//! Decoding of user-supplied structured payloads (assignment config,
//! template metadata).
//!
//! Payloads are rejected locally with a field-level message before any
//! store call is attempted.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-level structured input error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Input is not valid JSON.
    Malformed {
        field: &'static str,
        line: usize,
        column: usize,
        message: String,
    },
    /// Input is JSON but not an object.
    NotAnObject {
        field: &'static str,
        found: &'static str,
    },
}

impl PayloadError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Malformed { field, .. } | Self::NotAnObject { field, .. } => field,
        }
    }
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed {
                field,
                line,
                column,
                message,
            } => write!(
                f,
                "{field}: invalid JSON at line {line}, column {column}: {message}"
            ),
            Self::NotAnObject { field, found } => {
                write!(f, "{field}: expected a JSON object, found {found}")
            }
        }
    }
}

impl Error for PayloadError {}

/// Decodes one structured payload into a JSON object.
///
/// Blank input decodes to an empty object.
pub fn decode_structured_payload(field: &'static str, raw: &str) -> Result<Value, PayloadError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|err| PayloadError::Malformed {
        field,
        line: err.line(),
        column: err.column(),
        message: err.to_string(),
    })?;

    if !value.is_object() {
        return Err(PayloadError::NotAnObject {
            field,
            found: json_kind(&value),
        });
    }
    Ok(value)
}

/// Like [`decode_structured_payload`] but blank input means "absent".
pub fn decode_optional_payload(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<Value>, PayloadError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => decode_structured_payload(field, text).map(Some),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_optional_payload, decode_structured_payload, PayloadError};
    use serde_json::json;

    #[test]
    fn decodes_object_payload() {
        let value = decode_structured_payload("config", r#"{"checklist": ["hull", "mast"]}"#)
            .expect("object payload should decode");
        assert_eq!(value, json!({"checklist": ["hull", "mast"]}));
    }

    #[test]
    fn blank_payload_is_empty_object() {
        let value = decode_structured_payload("config", "   ").expect("blank should decode");
        assert_eq!(value, json!({}));
    }

    #[test]
    fn malformed_payload_reports_field_and_position() {
        let err = decode_structured_payload("metadata", "{\"a\": }")
            .expect_err("malformed payload must be rejected");
        assert_eq!(err.field(), "metadata");
        assert!(matches!(err, PayloadError::Malformed { line: 1, .. }));
        assert!(err.to_string().starts_with("metadata:"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = decode_structured_payload("config", "[1]").expect_err("array must be rejected");
        assert_eq!(
            err,
            PayloadError::NotAnObject {
                field: "config",
                found: "array"
            }
        );
    }

    #[test]
    fn optional_payload_treats_blank_as_absent() {
        assert_eq!(decode_optional_payload("metadata", None), Ok(None));
        assert_eq!(decode_optional_payload("metadata", Some("  ")), Ok(None));
        assert!(decode_optional_payload("metadata", Some("{}"))
            .expect("empty object decodes")
            .is_some());
    }
}
