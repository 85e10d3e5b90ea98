//! Patient intake service
//!
//! Record type descriptors, form submission, patient profiles and the
//! composite patient view for the concussion intake platform.
//!
//! - [`records`]: one static descriptor per sensitive record type
//! - [`registry`]: a lifecycle-hooked repository per type, built from [`IntakeConfig`]
//! - [`forms`]: validated, once-per-patient form submission
//! - [`patients`]: profile registration and deterministic e-mail lookup
//! - [`composite`]: the cross-record decrypted view with skip-and-flag failures
//!
//! # Example
//!
//! ```rust,no_run
//! use database_layer::InMemoryStore;
//! use intake_service::{CompositeViewService, IntakeConfig, RecordRegistry};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), intake_service::IntakeError> {
//! let config = IntakeConfig::load()?;
//! let registry = Arc::new(RecordRegistry::new(Arc::new(InMemoryStore::new()), &config)?);
//!
//! let views = CompositeViewService::new(registry, config.composite_timeout);
//! let view = views.composite_view("admin-1", "user-1").await?;
//! if view.is_partial {
//!     for report in view.failures() {
//!         println!("{}: {:?}", report.code, report.context.record_id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod composite;
pub mod config;
pub mod error;
pub mod forms;
pub mod notify;
pub mod patients;
pub mod records;
pub mod registry;
pub mod validation;

pub use composite::{CompositeSection, CompositeView, CompositeViewService, SectionStatus};
pub use config::IntakeConfig;
pub use error::{skipped_record_report, IntakeError, IntakeResult};
pub use forms::{FormSubmissionService, SubmissionReceipt};
pub use notify::{LogNotifier, NotifyError, SubmissionEvent, SubmissionNotifier};
pub use patients::{PatientDirectory, ProviderPatients};
pub use records::{RecordKind, RecordSpec, ADMIN_ID_FIELD, PATIENT_ID_FIELD, USER_ID_FIELD};
pub use registry::RecordRegistry;
pub use validation::{StructuralValidator, SubmissionValidator, ValidationError};
