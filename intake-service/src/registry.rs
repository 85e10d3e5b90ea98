// One lifecycle-hooked repository per record type
use crate::config::IntakeConfig;
use crate::error::{IntakeError, IntakeResult};
use crate::records::RecordKind;
use database_layer::{DocumentStore, FieldSetCodec, SensitiveRepository};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Repositories for every record type, sharing one document store
///
/// Built once at startup. A cipher that cannot be created for any
/// collection fails construction, so a misconfigured deployment never
/// serves writes.
#[derive(Clone)]
pub struct RecordRegistry {
    repositories: BTreeMap<RecordKind, SensitiveRepository>,
}

impl RecordRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, config: &IntakeConfig) -> IntakeResult<Self> {
        config.validate()?;

        let mut repositories = BTreeMap::new();
        for kind in RecordKind::ALL {
            let mode = config.mode_for(kind);
            let codec = FieldSetCodec::from_config(kind.spec().field_set(mode), &config.cipher)
                .map_err(|e| IntakeError::Configuration(e.to_string()))?;
            repositories.insert(kind, SensitiveRepository::new(Arc::clone(&store), codec));
        }

        info!(
            record_types = repositories.len(),
            key_version = config.cipher.key_version,
            "Record registry initialised"
        );
        Ok(Self { repositories })
    }

    pub fn repository(&self, kind: RecordKind) -> IntakeResult<&SensitiveRepository> {
        self.repositories.get(&kind).ok_or_else(|| {
            IntakeError::Configuration(format!("No repository registered for {}", kind.collection()))
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = RecordKind> + '_ {
        self.repositories.keys().copied()
    }
}
