// Document persistence seam
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{document_id, Document};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Conjunction of field equality conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Filter matching every document
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    /// JSON object form, suitable for JSONB containment (`@>`)
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.conditions
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect(),
        )
    }
}

/// Storage backend for raw (still encrypted) documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; it must carry an `_id`
    async fn insert(&self, collection: &str, doc: Document) -> DatabaseResult<()>;

    /// Fetch a document by `_id`
    async fn find_by_id(&self, collection: &str, id: &str) -> DatabaseResult<Option<Document>>;

    /// Fetch every document matching `filter`
    async fn find(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<Document>>;

    /// Merge `patch` into an existing document and return the result
    async fn update(&self, collection: &str, id: &str, patch: Document) -> DatabaseResult<Document>;

    /// `_id`s of the documents matching `filter`
    async fn collection_ids(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<String>>;
}

fn require_id(collection: &str, doc: &Document) -> DatabaseResult<String> {
    document_id(doc)
        .map(str::to_string)
        .ok_or_else(|| DatabaseError::InvalidDocument(format!("document for {collection} has no _id")))
}

/// In-memory document store for development/testing
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, BTreeMap<String, Document>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace a stored document wholesale, bypassing every hook (for testing)
    pub async fn put_raw(&self, collection: &str, doc: Document) -> DatabaseResult<()> {
        let id = require_id(collection, &doc)?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id, doc);
        Ok(())
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: &str, doc: Document) -> DatabaseResult<()> {
        let id = require_id(collection, &doc)?;
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if documents.contains_key(&id) {
            return Err(DatabaseError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        documents.insert(id, doc);
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> DatabaseResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn find(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> DatabaseResult<Document> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| DatabaseError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in patch {
            doc.insert(key, value);
        }
        Ok(doc.clone())
    }

    async fn collection_ids(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, doc)| filter.matches(doc))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find_by_id() {
        let store = InMemoryStore::new();
        store
            .insert("injuries", doc(json!({ "_id": "a", "userId": "u1" })))
            .await
            .unwrap();

        let found = store.find_by_id("injuries", "a").await.unwrap().unwrap();
        assert_eq!(found.get("userId"), Some(&json!("u1")));
        assert!(store.find_by_id("injuries", "b").await.unwrap().is_none());
        assert!(store.find_by_id("headache", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates_and_missing_ids() {
        let store = InMemoryStore::new();
        store.insert("users", doc(json!({ "_id": "a" }))).await.unwrap();

        assert!(matches!(
            store.insert("users", doc(json!({ "_id": "a" }))).await,
            Err(DatabaseError::DuplicateId { .. })
        ));
        assert!(matches!(
            store.insert("users", doc(json!({ "name": "x" }))).await,
            Err(DatabaseError::InvalidDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_find_applies_conjunctive_filter() {
        let store = InMemoryStore::new();
        store.insert("allergies", doc(json!({ "_id": "1", "userId": "u1", "adminId": "a1" }))).await.unwrap();
        store.insert("allergies", doc(json!({ "_id": "2", "userId": "u1", "adminId": "a2" }))).await.unwrap();
        store.insert("allergies", doc(json!({ "_id": "3", "userId": "u2", "adminId": "a1" }))).await.unwrap();

        let filter = Filter::all().eq("userId", "u1").eq("adminId", "a1");
        let found = store.find("allergies", &filter).await.unwrap();
        assert_eq!(found.len(), 1);

        let ids = store.collection_ids("allergies", &Filter::all().eq("userId", "u1")).await.unwrap();
        assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(store.count("allergies").await, 3);
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let store = InMemoryStore::new();
        store
            .insert("users", doc(json!({ "_id": "u1", "isInjuryFormCompleted": false, "firstName": "x" })))
            .await
            .unwrap();

        let updated = store
            .update("users", "u1", doc(json!({ "isInjuryFormCompleted": true })))
            .await
            .unwrap();

        assert_eq!(updated.get("isInjuryFormCompleted"), Some(&json!(true)));
        assert_eq!(updated.get("firstName"), Some(&json!("x")));
        assert!(matches!(
            store.update("users", "missing", Document::new()).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn test_filter_to_json() {
        let filter = Filter::all().eq("userId", "u1").eq("isAdmin", true);
        assert_eq!(filter.to_json(), json!({ "userId": "u1", "isAdmin": true }));
        assert!(Filter::all().matches(&Document::new()));
    }
}
