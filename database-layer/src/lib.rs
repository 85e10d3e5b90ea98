//! Encrypted document storage for patient records
//!
//! This crate turns the field cipher from `crypto` into a storage layer:
//! - [`FieldSetCodec`]: encodes a record's declared sensitive fields before
//!   a write and decodes them on explicit request
//! - [`SensitiveRepository`]: lifecycle hooks for one record type; every
//!   create/update is encoded, reads stay encrypted until
//!   [`SensitiveRepository::decrypted`] is called with an allow-list
//! - [`DocumentStore`]: the persistence seam, implemented by
//!   [`InMemoryStore`] and the PostgreSQL JSONB [`PostgresStore`]
//!
//! # Persisted shape
//!
//! Encoded fields keep their name and hold a ciphertext string. A companion
//! `__enc_{field}: true` marker records that the field was encoded; declared
//! fields without a marker are legacy plaintext and are returned unchanged.
//!
//! ```json
//! {
//!   "_id": "0b6c…",
//!   "patientId": "PAT-…",
//!   "email": "v1:siv:…:…",
//!   "__enc_email": true
//! }
//! ```
//!
//! # Example
//!
//! ```rust
//! use crypto::{EncryptionMode, FieldCipher};
//! use database_layer::{FieldSetCodec, InMemoryStore, SensitiveFieldSet, SensitiveRepository};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fields = SensitiveFieldSet::new("users", EncryptionMode::Deterministic).text("email");
//! let cipher = FieldCipher::new(b"deployment-secret", b"abc", fields.mode())?;
//! let users = SensitiveRepository::new(
//!     Arc::new(InMemoryStore::new()),
//!     FieldSetCodec::new(fields, cipher),
//! );
//!
//! let doc = json!({ "email": "a@b.com", "patientId": "PAT-1" });
//! let stored = users.create(doc.as_object().cloned().unwrap_or_default()).await?;
//! let id = stored["_id"].as_str().unwrap_or_default();
//!
//! let view = users.decrypted(id, &["email"]).await?;
//! assert_eq!(view.and_then(|v| v.get("email").cloned()), Some(json!("a@b.com")));
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod encryption;
pub mod error;
pub mod models;
pub mod repository;
pub mod store;

pub use connection::{DatabasePool, PoolSettings, PostgresStore};
pub use encryption::{
    marker_key, DecodeError, EncodingError, FieldKind, FieldSetCodec, SensitiveField,
    SensitiveFieldSet, MARKER_PREFIX,
};
pub use error::{DatabaseError, DatabaseResult};
pub use models::{document_id, BaseModel, Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
pub use repository::{SealReport, SensitiveRepository};
pub use store::{DocumentStore, Filter, InMemoryStore};
