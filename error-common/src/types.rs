use crate::context::ErrorContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad category of a reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Configuration,
    Encryption,
    Decryption,
    Database,
    BusinessRule,
    Runtime,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::Encryption => "encryption",
            Self::Decryption => "decryption",
            Self::Database => "database",
            Self::BusinessRule => "business_rule",
            Self::Runtime => "runtime",
        }
    }
}

/// Serializable description of a failure, safe to hand to API callers.
///
/// Used both for whole-request errors and for per-section markers in
/// partially assembled responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error_id: Uuid,
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "ErrorContext::is_empty", default)]
    pub context: ErrorContext,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(code: &str, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            error_id: Uuid::new_v4(),
            code: code.to_string(),
            category,
            message: message.into(),
            context: ErrorContext::default(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;

    #[test]
    fn test_report_serializes_without_empty_context() {
        let report = ErrorReport::new(
            codes::encryption::DECRYPT_FAILED,
            ErrorCategory::Decryption,
            "field could not be decrypted",
        );
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["code"], "DECRYPT_5002");
        assert_eq!(json["category"], "decryption");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_report_keeps_identifiers_in_context() {
        let report = ErrorReport::new(
            codes::encryption::DECRYPT_FAILED,
            ErrorCategory::Decryption,
            "field could not be decrypted",
        )
        .with_context(
            ErrorContext::new()
                .with_collection("headache")
                .with_record_id("r-1")
                .with_field("painAtWorst"),
        );
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["context"]["collection"], "headache");
        assert_eq!(json["context"]["field"], "painAtWorst");
    }
}
