use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error context information
///
/// Only identifiers belong here. Field values from sensitive records must
/// never be attached, since contexts end up in logs and API responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub request_id: Option<String>,
    pub record_id: Option<String>,
    pub collection: Option<String>,
    pub field: Option<String>,
    pub additional: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn add_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.request_id.is_none()
            && self.record_id.is_none()
            && self.collection.is_none()
            && self.field.is_none()
            && self.additional.is_empty()
    }
}
