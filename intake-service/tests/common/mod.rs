// Shared fixtures for the intake-service integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use database_layer::{DatabaseError, DatabaseResult, Document, DocumentStore, Filter, InMemoryStore};
use intake_service::{IntakeConfig, PatientDirectory, RecordRegistry};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: &str = "integration-test-secret-0123";

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

pub fn config_with_secret(secret: &str) -> IntakeConfig {
    IntakeConfig::from_pairs([("ENCRYPTION_SECRET", secret), ("ENCRYPTION_SALT", "abc")]).unwrap()
}

pub fn config() -> IntakeConfig {
    config_with_secret(SECRET)
}

pub fn registry(store: Arc<dyn DocumentStore>) -> Arc<RecordRegistry> {
    Arc::new(RecordRegistry::new(store, &config()).unwrap())
}

pub fn id_of(doc: &Document) -> String {
    doc["_id"].as_str().unwrap().to_string()
}

/// Register a provider and one of their patients; returns (admin id, user id)
pub async fn seed_patient(directory: &PatientDirectory, email: &str) -> (String, String) {
    let admin = directory
        .register_admin(doc(serde_json::json!({
            "userName": format!("dr-{email}"),
            "email": format!("dr.{email}"),
            "fullName": "Dr. Rivera",
        })))
        .await
        .unwrap();
    let admin_id = id_of(&admin);

    let patient = directory
        .register_patient(
            &admin_id,
            doc(serde_json::json!({
                "email": email,
                "firstName": "Jane",
                "lastName": "Doe",
                "dateOfBirth": "1990-01-01",
            })),
        )
        .await
        .unwrap();

    (admin_id, id_of(&patient))
}

/// Store wrapper whose reads can be switched to fail or stall
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_reads: AtomicBool,
    stall_reads: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_reads: AtomicBool::new(false),
            stall_reads: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn stall_reads(&self) {
        self.stall_reads.store(true, Ordering::SeqCst);
    }

    async fn before_read(&self) -> DatabaseResult<()> {
        if self.stall_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionFailed("connection reset by peer".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn insert(&self, collection: &str, doc: Document) -> DatabaseResult<()> {
        self.inner.insert(collection, doc).await
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> DatabaseResult<Option<Document>> {
        self.before_read().await?;
        self.inner.find_by_id(collection, id).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<Document>> {
        self.before_read().await?;
        self.inner.find(collection, filter).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> DatabaseResult<Document> {
        self.inner.update(collection, id, patch).await
    }

    async fn collection_ids(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<String>> {
        self.before_read().await?;
        self.inner.collection_ids(collection, filter).await
    }
}
