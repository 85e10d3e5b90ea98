//! Common error handling utilities for the NeuroIntake engine
//!
//! This module provides the error codes and the serializable error report
//! shared by every crate in the workspace. Crates keep their own `thiserror`
//! enums; this crate only defines what a caller is allowed to see.
//!
//! # Error Categories
//!
//! - **Validation**: Rejected submissions from the validation boundary
//! - **Configuration**: Missing or malformed cipher secret/salt
//! - **Encryption**: Encode failures before a write
//! - **Decryption**: Ciphertext that cannot be decoded with the configured key
//! - **Database**: Store connectivity and query failures
//! - **BusinessRule**: Completion-flag and ownership violations
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, ErrorCategory, ErrorContext, ErrorReport};
//!
//! let report = ErrorReport::new(
//!     codes::encryption::DECRYPT_FAILED,
//!     ErrorCategory::Decryption,
//!     "sub-record could not be decrypted",
//! )
//! .with_context(ErrorContext::new().with_collection("headache"));
//!
//! assert_eq!(report.code, "DECRYPT_5002");
//! ```

pub mod codes;
pub mod context;
pub mod types;

pub use context::*;
pub use types::*;
