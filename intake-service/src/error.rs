use crate::validation::ValidationError;
use crypto::CryptoError;
use database_layer::{DatabaseError, DecodeError, EncodingError};
use error_common::{codes, ErrorCategory, ErrorContext, ErrorReport};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Decryption(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("The {form} has already been completed for patient {user_id}")]
    AlreadyCompleted { form: String, user_id: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("E-mail address is already registered")]
    DuplicateEmail,

    #[error("Lookup on {collection}.{field} requires deterministic encryption")]
    LookupNotSupported { collection: String, field: String },

    #[error("Storage error: {0}")]
    Storage(DatabaseError),

    #[error("Composite view not assembled within {0:?}")]
    Timeout(Duration),
}

impl IntakeError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Stable error code from `error_common::codes`
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => codes::configuration::INVALID_SETTING,
            Self::Encoding(_) => codes::encryption::ENCODE_FAILED,
            Self::Decryption(_) => codes::encryption::DECRYPT_FAILED,
            Self::Validation(ValidationError::MissingField(_)) => codes::validation::MISSING_REQUIRED_FIELD,
            Self::Validation(ValidationError::InvalidEnumValue { .. }) => codes::validation::INVALID_ENUM_VALUE,
            Self::Validation(_) => codes::validation::INVALID_INPUT,
            Self::AlreadyCompleted { .. } => codes::forms::ALREADY_COMPLETED,
            Self::NotFound { .. } => codes::database::NOT_FOUND,
            Self::DuplicateEmail => codes::forms::DUPLICATE_EMAIL,
            Self::LookupNotSupported { .. } => codes::encryption::LOOKUP_NOT_SUPPORTED,
            Self::Storage(DatabaseError::ConnectionFailed(_)) => codes::database::CONNECTION_FAILED,
            Self::Storage(_) => codes::database::QUERY_FAILED,
            Self::Timeout(_) => codes::runtime::TIMEOUT,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Encoding(_) | Self::LookupNotSupported { .. } => ErrorCategory::Encryption,
            Self::Decryption(_) => ErrorCategory::Decryption,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::AlreadyCompleted { .. } | Self::DuplicateEmail | Self::NotFound { .. } => {
                ErrorCategory::BusinessRule
            }
            Self::Storage(_) => ErrorCategory::Database,
            Self::Timeout(_) => ErrorCategory::Runtime,
        }
    }

    /// Serializable report for the caller
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport::new(self.code(), self.category(), self.to_string())
    }
}

impl From<DatabaseError> for IntakeError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Encoding(e) => Self::Encoding(e),
            DatabaseError::Decode(e) => Self::Decryption(e),
            DatabaseError::LookupNotSupported { collection, field } => {
                Self::LookupNotSupported { collection, field }
            }
            DatabaseError::NotFound { collection, id } => Self::NotFound { entity: collection, id },
            other => Self::Storage(other),
        }
    }
}

impl From<CryptoError> for IntakeError {
    fn from(err: CryptoError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// Marker for a sub-record left out of an assembled view because it could not be decoded
pub fn skipped_record_report(collection: &str, record_id: &str, err: &DecodeError) -> ErrorReport {
    ErrorReport::new(
        codes::encryption::DECRYPT_FAILED,
        ErrorCategory::Decryption,
        format!("Record {record_id} in {collection} could not be decrypted"),
    )
    .with_context(
        ErrorContext::new()
            .with_collection(collection)
            .with_record_id(record_id)
            .with_field(err.field()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_classified() {
        let err: IntakeError = DatabaseError::QueryFailed("connection reset".into()).into();
        assert!(matches!(err, IntakeError::Storage(_)));
        assert_eq!(err.code(), codes::database::QUERY_FAILED);

        let err: IntakeError = DatabaseError::NotFound {
            collection: "users".into(),
            id: "u1".into(),
        }
        .into();
        assert!(matches!(err, IntakeError::NotFound { .. }));
    }

    #[test]
    fn test_codes_and_categories() {
        let err = IntakeError::AlreadyCompleted {
            form: "injury form".into(),
            user_id: "u1".into(),
        };
        assert_eq!(err.code(), "FORM_2001");
        assert_eq!(err.category(), ErrorCategory::BusinessRule);

        let report = IntakeError::Timeout(Duration::from_secs(10)).to_report();
        assert_eq!(report.code, "RUNTIME_6001");
        assert_eq!(report.category, ErrorCategory::Runtime);
    }

    #[test]
    fn test_skipped_record_report_carries_identifiers_only() {
        let err = DecodeError::NotCiphertext {
            field: "allergen".into(),
        };
        let report = skipped_record_report("allergies", "rec-1", &err);

        assert_eq!(report.code, codes::encryption::DECRYPT_FAILED);
        assert_eq!(report.context.collection.as_deref(), Some("allergies"));
        assert_eq!(report.context.record_id.as_deref(), Some("rec-1"));
        assert_eq!(report.context.field.as_deref(), Some("allergen"));
    }

    #[test]
    fn test_validation_codes() {
        let err: IntakeError = ValidationError::MissingField("setting".into()).into();
        assert_eq!(err.code(), codes::validation::MISSING_REQUIRED_FIELD);
    }
}
