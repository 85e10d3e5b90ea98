// Validation boundary for form submissions
use crate::records::RecordKind;
use database_layer::{Document, FieldKind, ID_FIELD, MARKER_PREFIX};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value '{value}' for {field}; expected one of: {allowed}")]
    InvalidEnumValue {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("Field '{field}' must be a {expected}")]
    InvalidType { field: String, expected: FieldKind },

    #[error("Field '{0}' may not be supplied by the client")]
    ReservedField(String),

    #[error("Records in {0} are not submitted as forms")]
    NotSubmittable(String),
}

/// Rejects malformed submissions before they reach the lifecycle hooks
pub trait SubmissionValidator: Send + Sync {
    fn validate(&self, kind: RecordKind, payload: &Document) -> Result<(), ValidationError>;
}

/// Checks required fields, enum values and declared kinds from the record descriptor
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl SubmissionValidator for StructuralValidator {
    fn validate(&self, kind: RecordKind, payload: &Document) -> Result<(), ValidationError> {
        let spec = kind.spec();

        if let Some(key) = payload
            .keys()
            .find(|key| key.as_str() == ID_FIELD || key.starts_with(MARKER_PREFIX))
        {
            return Err(ValidationError::ReservedField(key.clone()));
        }

        for field in spec.required {
            if is_blank(payload.get(*field)) {
                return Err(ValidationError::MissingField((*field).to_string()));
            }
        }

        for (field, allowed) in spec.enums {
            match payload.get(*field) {
                None | Some(Value::Null) => {}
                Some(Value::String(value)) if allowed.contains(&value.as_str()) => {}
                Some(other) => {
                    return Err(ValidationError::InvalidEnumValue {
                        field: (*field).to_string(),
                        value: other.as_str().map_or_else(|| other.to_string(), str::to_string),
                        allowed: allowed.join(", "),
                    })
                }
            }
        }

        for (field, expected) in spec.sensitive {
            let Some(value) = payload.get(*field) else {
                continue;
            };
            if !accepts(*expected, value) {
                return Err(ValidationError::InvalidType {
                    field: (*field).to_string(),
                    expected: *expected,
                });
            }
        }

        Ok(())
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn accepts(kind: FieldKind, value: &Value) -> bool {
    match (kind, value) {
        (_, Value::Null) => true,
        (FieldKind::Text, Value::String(_) | Value::Number(_) | Value::Bool(_)) => true,
        (FieldKind::Number, Value::Number(_)) => true,
        (FieldKind::Number, Value::String(s)) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        (FieldKind::Boolean, Value::Bool(_)) => true,
        (FieldKind::Boolean, Value::String(s)) => matches!(s.trim(), "true" | "false"),
        _ => false,
    }
}
