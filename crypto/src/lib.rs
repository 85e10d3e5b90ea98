//! Field-level encryption for patient documents
//!
//! This crate provides the primitives used to protect individual document
//! fields at rest:
//! - [`FieldCipher`]: AES-256-GCM-SIV (deterministic) and AES-256-GCM
//!   (randomized) with keys derived per field set
//! - [`Kdf`]: HKDF-SHA256 derivation of keys and synthetic nonces
//! - [`CipherConfig`]: deployment secret, salts and key version
//!
//! # Example
//!
//! ```rust
//! use crypto::{EncryptionMode, FieldCipher};
//!
//! let cipher = FieldCipher::new(b"deployment-secret", b"abc", EncryptionMode::Deterministic)?;
//! let sealed = cipher.encrypt("a@b.com")?;
//!
//! assert_eq!(sealed, cipher.encrypt("a@b.com")?);
//! assert_eq!(cipher.decrypt(&sealed)?, "a@b.com");
//! # Ok::<(), crypto::CryptoError>(())
//! ```

pub mod config;
pub mod error;
pub mod field_cipher;
pub mod kdf;

pub use config::{parse_salt_overrides, CipherConfig, EncryptionMode, MIN_SECRET_LEN};
pub use error::*;
pub use field_cipher::FieldCipher;
pub use kdf::Kdf;
