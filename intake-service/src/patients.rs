// Patient and provider profiles
use crate::error::{skipped_record_report, IntakeError, IntakeResult};
use crate::records::{completion_flags, RecordKind, ADMIN_ID_FIELD, PATIENT_ID_FIELD};
use crate::registry::RecordRegistry;
use crate::validation::{StructuralValidator, SubmissionValidator};
use database_layer::{document_id, DatabaseError, Document, Filter, ID_FIELD, MARKER_PREFIX};
use error_common::ErrorReport;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const EMAIL_FIELD: &str = "email";

/// Decrypted patient-info forms of one provider
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderPatients {
    pub patients: Vec<Document>,
    /// Forms left out because they could not be decrypted
    pub failures: Vec<ErrorReport>,
}

impl ProviderPatients {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Profile registration and e-mail lookup
///
/// E-mail addresses are normalised to lower case and stored with
/// deterministic encryption, so uniqueness and lookup are equality
/// queries on ciphertext.
pub struct PatientDirectory {
    registry: Arc<RecordRegistry>,
}

impl PatientDirectory {
    pub fn new(registry: Arc<RecordRegistry>) -> Self {
        Self { registry }
    }

    /// Create a provider profile; returns its decrypted projection
    pub async fn register_admin(&self, mut profile: Document) -> IntakeResult<Document> {
        normalize_email(&mut profile);
        StructuralValidator.validate(RecordKind::AdminUser, &profile)?;
        self.ensure_email_free(RecordKind::AdminUser, &profile).await?;

        let repository = self.registry.repository(RecordKind::AdminUser)?;
        let stored = repository.create(profile).await?;
        info!(admin_id = ?document_id(&stored), "Provider registered");

        Ok(repository
            .codec()
            .decode_projection(&stored, &RecordKind::AdminUser.spec().projection())?)
    }

    /// Create a patient profile owned by `admin_id`; returns its decrypted projection
    pub async fn register_patient(&self, admin_id: &str, mut profile: Document) -> IntakeResult<Document> {
        let admins = self.registry.repository(RecordKind::AdminUser)?;
        if admins.find_raw(admin_id).await?.is_none() {
            return Err(IntakeError::not_found("provider", admin_id));
        }

        profile.retain(|key, _| key != ID_FIELD && !key.starts_with(MARKER_PREFIX));
        normalize_email(&mut profile);
        profile.insert(ADMIN_ID_FIELD.to_string(), Value::String(admin_id.to_string()));
        StructuralValidator.validate(RecordKind::User, &profile)?;
        self.ensure_email_free(RecordKind::User, &profile).await?;

        let patient_id = format!("PAT-{}", Uuid::new_v4());
        profile.insert(PATIENT_ID_FIELD.to_string(), Value::String(patient_id.clone()));
        for flag in completion_flags() {
            profile.insert(flag.to_string(), Value::Bool(false));
        }

        let users = self.registry.repository(RecordKind::User)?;
        let stored = users.create(profile).await?;
        info!(
            user_id = ?document_id(&stored),
            patient_id = %patient_id,
            admin_id = %admin_id,
            "Patient registered"
        );

        Ok(users
            .codec()
            .decode_projection(&stored, &RecordKind::User.spec().projection())?)
    }

    /// Decrypted profile of the patient registered under `email`
    pub async fn find_patient_by_email(&self, email: &str) -> IntakeResult<Option<Document>> {
        let users = self.registry.repository(RecordKind::User)?;
        let matches = users
            .find_by_sensitive_value(EMAIL_FIELD, &Value::String(email.trim().to_lowercase()))
            .await?;

        let Some(raw) = matches.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(
            users
                .codec()
                .decode_projection(&raw, &RecordKind::User.spec().projection())?,
        ))
    }

    /// Decrypted profile of one patient
    pub async fn patient_profile(&self, user_id: &str) -> IntakeResult<Document> {
        self.registry
            .repository(RecordKind::User)?
            .decrypted(user_id, &RecordKind::User.spec().projection())
            .await?
            .ok_or_else(|| IntakeError::not_found("patient", user_id))
    }

    /// Patient-info forms submitted by the patients of `admin_id`
    ///
    /// A form that cannot be decrypted is left out and reported in
    /// `failures`; a store failure fails the whole listing.
    pub async fn patients_for_admin(&self, admin_id: &str) -> IntakeResult<ProviderPatients> {
        let kind = RecordKind::PatientInfoForm;
        let repository = self.registry.repository(kind)?;
        let projection = kind.spec().projection();
        let ids = repository
            .find_ids(&Filter::all().eq(ADMIN_ID_FIELD, admin_id))
            .await?;

        let mut listing = ProviderPatients::default();
        for id in ids {
            match repository.decrypted(&id, &projection).await {
                Ok(Some(form)) => listing.patients.push(form),
                Ok(None) => {}
                Err(DatabaseError::Decode(e)) => {
                    warn!(
                        collection = kind.collection(),
                        record_id = %id,
                        field = e.field(),
                        "Skipping undecryptable patient info form"
                    );
                    listing
                        .failures
                        .push(skipped_record_report(kind.collection(), &id, &e));
                }
                Err(other) => return Err(other.into()),
            }
        }

        Ok(listing)
    }

    async fn ensure_email_free(&self, kind: RecordKind, profile: &Document) -> IntakeResult<()> {
        let Some(email) = profile.get(EMAIL_FIELD) else {
            return Ok(());
        };
        let existing = self
            .registry
            .repository(kind)?
            .find_by_sensitive_value(EMAIL_FIELD, email)
            .await?;
        if existing.is_empty() {
            Ok(())
        } else {
            Err(IntakeError::DuplicateEmail)
        }
    }
}

fn normalize_email(profile: &mut Document) {
    if let Some(Value::String(email)) = profile.get_mut(EMAIL_FIELD) {
        *email = email.trim().to_lowercase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_email() {
        let mut profile = json!({ "email": "  Jane.Doe@Example.COM " })
            .as_object()
            .cloned()
            .unwrap();
        normalize_email(&mut profile);
        assert_eq!(profile["email"], "jane.doe@example.com");
    }

    #[test]
    fn test_provider_patients_partial_flag() {
        let mut listing = ProviderPatients::default();
        assert!(!listing.is_partial());
        listing.failures.push(ErrorReport::new(
            error_common::codes::encryption::DECRYPT_FAILED,
            error_common::ErrorCategory::Decryption,
            "skipped",
        ));
        assert!(listing.is_partial());
    }
}
