//! Composite patient view
//!
//! Assembles one decrypted view of a patient from the profile and every
//! related form collection. Collections are fetched concurrently; inside a
//! collection each document is re-fetched by id and decoded on its own, so
//! one corrupt record never blanks out its siblings.
//!
//! Failure policy:
//! - a document that cannot be decoded is skipped and flagged with an
//!   [`ErrorReport`] on its section, and the view is marked partial
//! - a store failure, an undecodable profile or an elapsed deadline fails
//!   the whole request without returning any data

use crate::error::{skipped_record_report, IntakeError, IntakeResult};
use crate::records::{RecordKind, ADMIN_ID_FIELD, USER_ID_FIELD};
use crate::registry::RecordRegistry;
use database_layer::{DatabaseError, Document, Filter};
use error_common::ErrorReport;
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Key under which [`CompositeView::to_document`] lists skipped records
pub const FAILURES_FIELD: &str = "decryptionFailures";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Every document decoded
    Complete,
    /// Some documents decoded, some were skipped
    Partial,
    /// Documents exist but none could be decoded
    Failed,
    /// The patient has no documents of this type
    Empty,
}

/// Decoded documents of one related record type
#[derive(Debug, Clone, Serialize)]
pub struct CompositeSection {
    pub kind: RecordKind,
    pub collection: &'static str,
    pub status: SectionStatus,
    pub records: Vec<Document>,
    pub failures: Vec<ErrorReport>,
}

impl CompositeSection {
    fn new(kind: RecordKind, records: Vec<Document>, failures: Vec<ErrorReport>) -> Self {
        let status = match (records.is_empty(), failures.is_empty()) {
            (true, true) => SectionStatus::Empty,
            (_, true) => SectionStatus::Complete,
            (true, false) => SectionStatus::Failed,
            (false, false) => SectionStatus::Partial,
        };
        Self {
            kind,
            collection: kind.collection(),
            status,
            records,
            failures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositeView {
    pub profile: Document,
    pub sections: Vec<CompositeSection>,
    /// True when any section skipped a record
    pub is_partial: bool,
}

impl CompositeView {
    pub fn section(&self, kind: RecordKind) -> Option<&CompositeSection> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ErrorReport> {
        self.sections.iter().flat_map(|section| section.failures.iter())
    }

    /// Flatten into one document: the profile plus one array per collection
    pub fn to_document(&self) -> Document {
        let mut doc = self.profile.clone();
        for section in &self.sections {
            doc.insert(
                section.collection.to_string(),
                Value::Array(section.records.iter().cloned().map(Value::Object).collect()),
            );
        }
        if self.is_partial {
            let failures = self
                .failures()
                .filter_map(|report| match serde_json::to_value(report) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(code = %report.code, error = %e, "Dropping unserializable failure marker");
                        None
                    }
                })
                .collect();
            doc.insert(FAILURES_FIELD.to_string(), Value::Array(failures));
        }
        doc
    }
}

pub struct CompositeViewService {
    registry: Arc<RecordRegistry>,
    timeout: Duration,
}

impl CompositeViewService {
    pub fn new(registry: Arc<RecordRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Assemble the view of `user_id` for the provider `admin_id`
    ///
    /// A patient owned by another provider is reported as not found.
    pub async fn composite_view(&self, admin_id: &str, user_id: &str) -> IntakeResult<CompositeView> {
        tokio::time::timeout(self.timeout, self.assemble(admin_id, user_id))
            .await
            .map_err(|_| {
                warn!(user_id = %user_id, timeout = ?self.timeout, "Composite view timed out");
                IntakeError::Timeout(self.timeout)
            })?
    }

    async fn assemble(&self, admin_id: &str, user_id: &str) -> IntakeResult<CompositeView> {
        let users = self.registry.repository(RecordKind::User)?;
        let raw = users
            .find_raw(user_id)
            .await?
            .filter(|profile| profile.get(ADMIN_ID_FIELD).and_then(Value::as_str) == Some(admin_id))
            .ok_or_else(|| IntakeError::not_found("patient", user_id))?;

        let profile = users
            .codec()
            .decode_projection(&raw, &RecordKind::User.spec().projection())?;

        debug!(user_id = %user_id, "Fanning out over related collections");
        let sections = try_join_all(RecordKind::forms().map(|kind| self.section(kind, user_id))).await?;
        let is_partial = sections.iter().any(|section| !section.failures.is_empty());

        info!(
            user_id = %user_id,
            sections = sections.len(),
            records = sections.iter().map(|s| s.records.len()).sum::<usize>(),
            is_partial,
            "Composite view assembled"
        );

        Ok(CompositeView {
            profile,
            sections,
            is_partial,
        })
    }

    async fn section(&self, kind: RecordKind, user_id: &str) -> IntakeResult<CompositeSection> {
        let repository = self.registry.repository(kind)?;
        let projection = kind.spec().projection();
        let ids = repository
            .find_ids(&Filter::all().eq(USER_ID_FIELD, user_id))
            .await?;

        let mut records = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();
        for id in ids {
            match repository.decrypted(&id, &projection).await {
                Ok(Some(doc)) => records.push(doc),
                Ok(None) => debug!(collection = kind.collection(), record_id = %id, "Record vanished during fan-out"),
                Err(DatabaseError::Decode(e)) => {
                    warn!(
                        collection = kind.collection(),
                        record_id = %id,
                        field = e.field(),
                        "Skipping undecryptable record"
                    );
                    failures.push(skipped_record_report(kind.collection(), &id, &e));
                }
                Err(other) => return Err(other.into()),
            }
        }

        Ok(CompositeSection::new(kind, records, failures))
    }
}
