// Delivery collaborators invoked after a successful submission
use crate::records::RecordKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logger_redacted::PiiRedactor;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// What a delivery collaborator learns about a submission
///
/// Identifiers only; no form content leaves the service this way.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionEvent {
    pub kind: RecordKind,
    pub record_id: String,
    pub user_id: String,
    pub admin_id: Option<String>,
    pub patient_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// E-mail/SMS style delivery after a form is stored
#[async_trait]
pub trait SubmissionNotifier: Send + Sync {
    async fn form_submitted(&self, event: &SubmissionEvent) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl SubmissionNotifier for LogNotifier {
    async fn form_submitted(&self, event: &SubmissionEvent) -> Result<(), NotifyError> {
        info!(
            kind = %event.kind,
            record_id = %event.record_id,
            user_id = %event.user_id,
            "Form submission recorded"
        );
        Ok(())
    }
}

/// Fire-and-forget delivery; failures are logged, never returned
///
/// Delivery errors often quote the recipient, so they are redacted before logging.
pub fn dispatch(notifier: Arc<dyn SubmissionNotifier>, event: SubmissionEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.form_submitted(&event).await {
            warn!(
                kind = %event.kind,
                record_id = %event.record_id,
                error = %PiiRedactor::default().redact(&e.to_string()),
                "Submission notification failed"
            );
        }
    })
}
