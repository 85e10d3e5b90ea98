//! Patient form submission
//!
//! A submission passes the validation boundary, is checked against the
//! patient's completion flags, is stamped with the patient's identifiers and
//! then written through the lifecycle hooks, which encrypt the declared
//! fields before anything reaches the store.

use crate::error::{IntakeError, IntakeResult};
use crate::notify::{dispatch, LogNotifier, SubmissionEvent, SubmissionNotifier};
use crate::records::{RecordKind, ADMIN_ID_FIELD, PATIENT_ID_FIELD, USER_ID_FIELD};
use crate::registry::RecordRegistry;
use crate::validation::{StructuralValidator, SubmissionValidator, ValidationError};
use chrono::Utc;
use database_layer::{document_id, Document, CREATED_AT_FIELD, ID_FIELD, MARKER_PREFIX, UPDATED_AT_FIELD};
use logger_redacted::PiiRedactor;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of a stored submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub kind: RecordKind,
    pub record_id: String,
    pub business_id: Option<String>,
    /// Completion flag set on the patient profile, if the form is one-shot
    pub completed_flag: Option<&'static str>,
}

pub struct FormSubmissionService {
    registry: Arc<RecordRegistry>,
    validator: Arc<dyn SubmissionValidator>,
    notifier: Arc<dyn SubmissionNotifier>,
}

impl FormSubmissionService {
    pub fn new(registry: Arc<RecordRegistry>) -> Self {
        Self {
            registry,
            validator: Arc::new(StructuralValidator),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SubmissionValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SubmissionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Store a form for the patient `user_id`
    ///
    /// One-shot forms are rejected with `AlreadyCompleted` once their flag is
    /// set on the profile; repeatable histories are always accepted.
    pub async fn submit(&self, user_id: &str, kind: RecordKind, mut payload: Document) -> IntakeResult<SubmissionReceipt> {
        if !kind.is_form() {
            return Err(ValidationError::NotSubmittable(kind.collection().to_string()).into());
        }
        if let Err(e) = self.validator.validate(kind, &payload) {
            debug!(
                form = %kind,
                error = %e,
                payload = %loggable(kind, &payload),
                "Rejected invalid submission"
            );
            return Err(e.into());
        }

        let users = self.registry.repository(RecordKind::User)?;
        let profile = users
            .find_raw(user_id)
            .await?
            .ok_or_else(|| IntakeError::not_found("patient", user_id))?;

        let spec = kind.spec();
        if let Some(flag) = spec.completion_flag {
            if profile.get(flag) == Some(&Value::Bool(true)) {
                debug!(user_id = %user_id, form = %kind, "Rejected repeat submission");
                return Err(IntakeError::AlreadyCompleted {
                    form: kind.to_string(),
                    user_id: user_id.to_string(),
                });
            }
        }

        strip_reserved(&mut payload);
        payload.insert(USER_ID_FIELD.to_string(), Value::String(user_id.to_string()));
        for field in [ADMIN_ID_FIELD, PATIENT_ID_FIELD] {
            if let Some(value) = profile.get(field) {
                payload.insert(field.to_string(), value.clone());
            }
        }

        let business_id = spec.business_id.map(|(field, prefix)| {
            let id = format!("{prefix}-{}", Uuid::new_v4());
            payload.insert(field.to_string(), Value::String(id.clone()));
            id
        });

        let stored = self.registry.repository(kind)?.create(payload).await?;
        let record_id = document_id(&stored).unwrap_or_default().to_string();

        if let Some(flag) = spec.completion_flag {
            let mut patch = Map::new();
            patch.insert(flag.to_string(), Value::Bool(true));
            users.update(user_id, patch).await?;
        }

        info!(
            user_id = %user_id,
            form = %kind,
            record_id = %record_id,
            "Form submitted"
        );

        dispatch(
            Arc::clone(&self.notifier),
            SubmissionEvent {
                kind,
                record_id: record_id.clone(),
                user_id: user_id.to_string(),
                admin_id: string_field(&profile, ADMIN_ID_FIELD),
                patient_id: string_field(&profile, PATIENT_ID_FIELD),
                submitted_at: Utc::now(),
            },
        );

        Ok(SubmissionReceipt {
            kind,
            record_id,
            business_id,
            completed_flag: spec.completion_flag,
        })
    }
}

/// Drop keys only the service may set, including forged encryption markers
fn strip_reserved(payload: &mut Document) {
    payload.retain(|key, _| {
        !key.starts_with(MARKER_PREFIX)
            && ![ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD].contains(&key.as_str())
    });
}

/// Payload with declared sensitive values blanked, for log lines
fn loggable(kind: RecordKind, payload: &Document) -> Value {
    let sensitive: Vec<&str> = kind.spec().sensitive.iter().map(|(name, _)| *name).collect();
    PiiRedactor::default().redact_document(&Value::Object(payload.clone()), &sensitive)
}

fn string_field(doc: &Document, field: &str) -> Option<String> {
    doc.get(field).and_then(Value::as_str).map(str::to_string)
}
