// Integration tests for the composite patient view
mod common;

use common::{config_with_secret, doc, registry, seed_patient, FaultyStore};
use database_layer::{DocumentStore, InMemoryStore};
use intake_service::{
    CompositeViewService, FormSubmissionService, IntakeError, PatientDirectory, RecordKind,
    RecordRegistry, SectionStatus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Submit forms for a patient under a registry that does not share the deployment secret
async fn submit_foreign(store: Arc<dyn DocumentStore>, user_id: &str, kind: RecordKind, payload: serde_json::Value) {
    let foreign = Arc::new(RecordRegistry::new(store, &config_with_secret("another-deployment-secret")).unwrap());
    FormSubmissionService::new(foreign)
        .submit(user_id, kind, doc(payload))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_corrupted_history_is_flagged_not_fatal() {
    let store = Arc::new(InMemoryStore::new());
    let registry = registry(store.clone());
    let directory = PatientDirectory::new(registry.clone());
    let forms = FormSubmissionService::new(registry.clone());
    let (admin_id, user_id) = seed_patient(&directory, "composite@example.com").await;

    // Three of five tracked histories populated; allergies is undecryptable
    forms
        .submit(&user_id, RecordKind::Injury, doc(json!({ "setting": "practice", "position": "goalkeeper" })))
        .await
        .unwrap();
    forms
        .submit(&user_id, RecordKind::Headache, doc(json!({ "painAtPresent": 3, "frequency": "daily" })))
        .await
        .unwrap();
    submit_foreign(store.clone(), &user_id, RecordKind::Allergies, json!({ "allergen": "peanuts" })).await;

    let view = CompositeViewService::new(registry, TIMEOUT)
        .composite_view(&admin_id, &user_id)
        .await
        .unwrap();

    assert_eq!(view.profile["firstName"], "Jane");
    assert!(view.is_partial);

    let injuries = view.section(RecordKind::Injury).unwrap();
    assert_eq!(injuries.status, SectionStatus::Complete);
    assert_eq!(injuries.records[0]["position"], "goalkeeper");

    let headaches = view.section(RecordKind::Headache).unwrap();
    assert_eq!(headaches.status, SectionStatus::Complete);
    assert_eq!(headaches.records[0]["painAtPresent"], 3);

    let allergies = view.section(RecordKind::Allergies).unwrap();
    assert_eq!(allergies.status, SectionStatus::Failed);
    assert!(allergies.records.is_empty());
    assert_eq!(allergies.failures.len(), 1);
    assert_eq!(allergies.failures[0].code, "DECRYPT_5002");
    assert_eq!(allergies.failures[0].context.field.as_deref(), Some("allergen"));

    for kind in [RecordKind::BodyPain, RecordKind::CurrentMedications] {
        assert_eq!(view.section(kind).unwrap().status, SectionStatus::Empty);
    }
    assert_eq!(view.failures().count(), 1);
}

#[tokio::test]
async fn test_partial_section_keeps_decoded_siblings() {
    let store = Arc::new(InMemoryStore::new());
    let registry = registry(store.clone());
    let directory = PatientDirectory::new(registry.clone());
    let forms = FormSubmissionService::new(registry.clone());
    let (admin_id, user_id) = seed_patient(&directory, "siblings@example.com").await;

    for medication in ["ibuprofen", "melatonin"] {
        forms
            .submit(&user_id, RecordKind::CurrentMedications, doc(json!({ "medicineName": medication })))
            .await
            .unwrap();
    }
    submit_foreign(
        store.clone(),
        &user_id,
        RecordKind::CurrentMedications,
        json!({ "medicineName": "sertraline" }),
    )
    .await;

    let view = CompositeViewService::new(registry, TIMEOUT)
        .composite_view(&admin_id, &user_id)
        .await
        .unwrap();

    let medications = view.section(RecordKind::CurrentMedications).unwrap();
    assert_eq!(medications.status, SectionStatus::Partial);
    assert_eq!(medications.records.len(), 2);
    assert_eq!(medications.failures.len(), 1);

    let merged = view.to_document();
    assert_eq!(merged["currentMedications"].as_array().unwrap().len(), 2);
    assert_eq!(merged["decryptionFailures"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_legacy_plaintext_history_is_returned() {
    let store = Arc::new(InMemoryStore::new());
    let registry = registry(store.clone());
    let directory = PatientDirectory::new(registry.clone());
    let (admin_id, user_id) = seed_patient(&directory, "legacy@example.com").await;

    store
        .put_raw(
            "allergies",
            doc(json!({ "_id": "legacy-allergy", "userId": user_id, "allergen": "shellfish" })),
        )
        .await
        .unwrap();

    let view = CompositeViewService::new(registry, TIMEOUT)
        .composite_view(&admin_id, &user_id)
        .await
        .unwrap();

    assert!(!view.is_partial);
    let allergies = view.section(RecordKind::Allergies).unwrap();
    assert_eq!(allergies.status, SectionStatus::Complete);
    assert_eq!(allergies.records[0]["allergen"], "shellfish");
}

#[tokio::test]
async fn test_other_providers_patient_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let registry = registry(store);
    let directory = PatientDirectory::new(registry.clone());
    let (_, user_id) = seed_patient(&directory, "scoped@example.com").await;
    let (other_admin, _) = seed_patient(&directory, "other@example.com").await;

    let result = CompositeViewService::new(registry, TIMEOUT)
        .composite_view(&other_admin, &user_id)
        .await;

    assert!(matches!(result, Err(IntakeError::NotFound { .. })));
}

#[tokio::test]
async fn test_store_failure_fails_whole_request() {
    let store = Arc::new(FaultyStore::new());
    let registry = registry(store.clone());
    let directory = PatientDirectory::new(registry.clone());
    let (admin_id, user_id) = seed_patient(&directory, "outage@example.com").await;

    store.fail_reads();
    let result = CompositeViewService::new(registry, TIMEOUT)
        .composite_view(&admin_id, &user_id)
        .await;

    assert!(matches!(result, Err(IntakeError::Storage(_))));
}

#[tokio::test]
async fn test_elapsed_deadline_is_timeout() {
    let store = Arc::new(FaultyStore::new());
    let registry = registry(store.clone());
    let directory = PatientDirectory::new(registry.clone());
    let (admin_id, user_id) = seed_patient(&directory, "slow@example.com").await;

    store.stall_reads();
    let timeout = Duration::from_millis(50);
    let result = CompositeViewService::new(registry, timeout)
        .composite_view(&admin_id, &user_id)
        .await;

    assert!(matches!(result, Err(IntakeError::Timeout(t)) if t == timeout));
}

#[tokio::test]
async fn test_undecryptable_profile_fails_whole_request() {
    let store = Arc::new(InMemoryStore::new());
    let registry = registry(store.clone());
    let directory = PatientDirectory::new(registry.clone());
    let (admin_id, user_id) = seed_patient(&directory, "anchor@example.com").await;

    let mut raw = store.find_by_id("users", &user_id).await.unwrap().unwrap();
    raw.insert("firstName".into(), json!("v1:siv:AAAAAAAAAAAAAAAA:AAAAAAAAAAAAAAAAAAAAAA=="));
    store.put_raw("users", raw).await.unwrap();

    let result = CompositeViewService::new(registry, TIMEOUT)
        .composite_view(&admin_id, &user_id)
        .await;

    assert!(matches!(result, Err(IntakeError::Decryption(_))));
}
