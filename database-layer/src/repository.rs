// Lifecycle hooks: encode on write, explicit decode on read
use crate::encryption::{marker_key, FieldSetCodec};
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{document_id, timestamp, BaseModel, Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use crate::store::{DocumentStore, Filter};
use chrono::Utc;
use crypto::EncryptionMode;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of sealing legacy plaintext documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SealReport {
    pub scanned: usize,
    pub sealed: usize,
}

/// Store access for one sensitive record type
///
/// Every write goes through the field set codec before it reaches the
/// store. Reads return raw documents unless the caller asks for a
/// decrypted projection.
#[derive(Clone)]
pub struct SensitiveRepository {
    store: Arc<dyn DocumentStore>,
    codec: FieldSetCodec,
}

impl SensitiveRepository {
    pub fn new(store: Arc<dyn DocumentStore>, codec: FieldSetCodec) -> Self {
        Self { store, codec }
    }

    pub fn collection(&self) -> &str {
        self.codec.collection()
    }

    pub fn codec(&self) -> &FieldSetCodec {
        &self.codec
    }

    /// Stamp identity and timestamps, encode, then insert
    ///
    /// Returns the stored (encoded) document. An encode failure aborts
    /// before the store is touched.
    pub async fn create(&self, mut doc: Document) -> DatabaseResult<Document> {
        let id = BaseModel::new().stamp(&mut doc);
        let encoded = self.codec.encode(&doc)?;

        self.store.insert(self.collection(), encoded.clone()).await?;

        info!(collection = self.collection(), id = %id, "Created encrypted record");
        Ok(encoded)
    }

    /// Encode the sensitive fields of `patch` and merge it into the stored document
    pub async fn update(&self, id: &str, mut patch: Document) -> DatabaseResult<Document> {
        patch.remove(ID_FIELD);
        patch.remove(CREATED_AT_FIELD);
        patch.insert(UPDATED_AT_FIELD.to_string(), timestamp(Utc::now()));

        let encoded = self.codec.encode(&patch)?;
        let updated = self.store.update(self.collection(), id, encoded).await?;

        debug!(collection = self.collection(), id = %id, "Updated record");
        Ok(updated)
    }

    /// Raw (still encrypted) document by id
    pub async fn find_raw(&self, id: &str) -> DatabaseResult<Option<Document>> {
        self.store.find_by_id(self.collection(), id).await
    }

    pub async fn find_ids(&self, filter: &Filter) -> DatabaseResult<Vec<String>> {
        self.store.collection_ids(self.collection(), filter).await
    }

    /// Raw (still encrypted) documents matching a structural filter
    pub async fn find_raw_by(&self, filter: &Filter) -> DatabaseResult<Vec<Document>> {
        self.store.find(self.collection(), filter).await
    }

    /// Fetch a document and decode only the allow-listed fields
    pub async fn decrypted(&self, id: &str, projection: &[&str]) -> DatabaseResult<Option<Document>> {
        let Some(raw) = self.find_raw(id).await? else {
            return Ok(None);
        };
        let projected = self.codec.decode_projection(&raw, projection)?;
        Ok(Some(projected))
    }

    /// Equality lookup on a sensitive field
    ///
    /// Matches encoded documents through their deterministic ciphertext and
    /// legacy documents through their plaintext. Legacy plaintext of a
    /// case-insensitive field is compared without regard to case, which
    /// needs a scan of the collection. Undeclared fields are matched directly.
    pub async fn find_by_sensitive_value(&self, field: &str, value: &Value) -> DatabaseResult<Vec<Document>> {
        let Some(declared) = self.codec.field_set().get(field) else {
            return self
                .find_raw_by(&Filter::all().eq(field, value.clone()))
                .await;
        };

        if self.codec.field_set().mode() != EncryptionMode::Deterministic {
            return Err(DatabaseError::LookupNotSupported {
                collection: self.collection().to_string(),
                field: field.to_string(),
            });
        }

        let Some(ciphertext) = self.codec.lookup_value(field, value)? else {
            return Ok(Vec::new());
        };

        let encoded = self
            .find_raw_by(&Filter::all().eq(field, ciphertext).eq(marker_key(field), true))
            .await?;
        let legacy_filter = if declared.fold_case {
            Filter::all()
        } else {
            Filter::all().eq(field, value.clone())
        };
        let legacy = self
            .find_raw_by(&legacy_filter)
            .await?
            .into_iter()
            .filter(|doc| !doc.contains_key(&marker_key(field)))
            .filter(|doc| {
                doc.get(field)
                    .is_some_and(|stored| declared.plaintext_matches(stored, value))
            });

        let mut seen = HashSet::new();
        Ok(encoded
            .into_iter()
            .chain(legacy)
            .filter(|doc| seen.insert(document_id(doc).map(str::to_string)))
            .collect())
    }

    /// Encode every document that still holds plaintext in a declared field
    pub async fn seal_legacy(&self, dry_run: bool) -> DatabaseResult<SealReport> {
        let documents = self.find_raw_by(&Filter::all()).await?;
        let mut report = SealReport {
            scanned: documents.len(),
            sealed: 0,
        };

        for doc in documents {
            if self.codec.is_sealed(&doc) {
                continue;
            }
            let Some(id) = document_id(&doc).map(str::to_string) else {
                continue;
            };

            if !dry_run {
                let encoded = self.codec.encode(&doc)?;
                let patch: Document = encoded
                    .into_iter()
                    .filter(|(key, value)| doc.get(key) != Some(value))
                    .collect();
                self.store.update(self.collection(), &id, patch).await?;
            }
            report.sealed += 1;
        }

        info!(
            collection = self.collection(),
            scanned = report.scanned,
            sealed = report.sealed,
            dry_run,
            "Legacy plaintext scan complete"
        );
        Ok(report)
    }
}
