// Document models
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A stored record: one JSON object per document
pub type Document = Map<String, Value>;

/// Primary key of every document
pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Identity and timestamps stamped onto a document when it is created
#[derive(Debug, Clone)]
pub struct BaseModel {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BaseModel {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Write `_id`, `createdAt` and `updatedAt`, keeping an `_id` the caller already chose
    pub fn stamp(&self, doc: &mut Document) -> String {
        let id = match doc.get(ID_FIELD).and_then(Value::as_str) {
            Some(existing) if !existing.is_empty() => existing.to_string(),
            _ => self.id.to_string(),
        };
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        doc.insert(CREATED_AT_FIELD.to_string(), timestamp(self.created_at));
        doc.insert(UPDATED_AT_FIELD.to_string(), timestamp(self.updated_at));
        id
    }
}

impl Default for BaseModel {
    fn default() -> Self {
        Self::new()
    }
}

/// RFC 3339 timestamp value
pub fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// The `_id` of a document, if it has one
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}
