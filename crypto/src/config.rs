//! Cipher configuration
//!
//! Provides the process-wide secret and salt configuration for field-level
//! encryption. A `CipherConfig` is built once at startup and handed to every
//! [`crate::FieldCipher`] constructor; cipher calls never read the
//! environment themselves.

use crate::error::{CryptoError, CryptoResult};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Minimum accepted length of the deployment secret, in bytes
pub const MIN_SECRET_LEN: usize = 16;

/// Field encryption mode, chosen per field set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// Same input always yields the same ciphertext; supports equality lookups
    Deterministic,
    /// Fresh nonce per value; confidentiality only
    #[default]
    Randomized,
}

impl FromStr for EncryptionMode {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deterministic" | "det" => Ok(EncryptionMode::Deterministic),
            "randomized" | "random" | "rnd" => Ok(EncryptionMode::Randomized),
            _ => Err(CryptoError::Configuration(format!(
                "Unknown encryption mode: {s}. Valid options: deterministic, randomized"
            ))),
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionMode::Deterministic => f.write_str("deterministic"),
            EncryptionMode::Randomized => f.write_str("randomized"),
        }
    }
}

/// Secret and salt configuration for field encryption
#[derive(Clone)]
pub struct CipherConfig {
    /// Deployment secret (`ENCRYPTION_SECRET`)
    pub secret: SecretString,

    /// Salt used by every field set without an override (`ENCRYPTION_SALT`)
    pub default_salt: String,

    /// Per-collection salt overrides
    pub salt_overrides: HashMap<String, String>,

    /// Current key version (`ENCRYPTION_KEY_VERSION`)
    pub key_version: u32,
}

impl fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherConfig")
            .field("secret", &"[REDACTED]")
            .field("default_salt", &"[REDACTED]")
            .field("salt_overrides", &self.salt_overrides.keys().collect::<Vec<_>>())
            .field("key_version", &self.key_version)
            .finish()
    }
}

impl CipherConfig {
    pub fn new(secret: impl Into<String>, default_salt: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            default_salt: default_salt.into(),
            salt_overrides: HashMap::new(),
            key_version: 1,
        }
    }

    pub fn with_salt_override(
        mut self,
        collection: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        self.salt_overrides.insert(collection.into(), salt.into());
        self
    }

    pub fn with_key_version(mut self, key_version: u32) -> Self {
        self.key_version = key_version;
        self
    }

    /// Assemble and validate a configuration from already-loaded settings
    ///
    /// `salt_overrides` uses the `collection=salt,collection=salt` form.
    pub fn from_settings(
        secret: impl Into<String>,
        default_salt: impl Into<String>,
        key_version: u32,
        salt_overrides: Option<&str>,
    ) -> CryptoResult<Self> {
        let mut config = Self::new(secret, default_salt).with_key_version(key_version);
        if let Some(overrides) = salt_overrides {
            config.salt_overrides = parse_salt_overrides(overrides)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the cipher configuration
    pub fn validate(&self) -> CryptoResult<()> {
        let secret = self.secret.expose_secret();
        if secret.trim().is_empty() {
            return Err(CryptoError::Configuration(
                "ENCRYPTION_SECRET must not be empty".to_string(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::Configuration(format!(
                "ENCRYPTION_SECRET must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }

        if self.default_salt.is_empty() {
            return Err(CryptoError::Configuration(
                "ENCRYPTION_SALT must not be empty".to_string(),
            ));
        }

        if let Some((collection, _)) = self.salt_overrides.iter().find(|(_, s)| s.is_empty()) {
            return Err(CryptoError::Configuration(format!(
                "Salt override for '{collection}' must not be empty"
            )));
        }

        if self.key_version == 0 {
            return Err(CryptoError::Configuration(
                "ENCRYPTION_KEY_VERSION must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Salt for a collection's field set
    pub fn salt_for(&self, collection: &str) -> &str {
        self.salt_overrides
            .get(collection)
            .map_or(self.default_salt.as_str(), String::as_str)
    }
}

/// Parse `collection=salt,collection=salt`
pub fn parse_salt_overrides(raw: &str) -> CryptoResult<HashMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(collection, salt)| (collection.trim().to_string(), salt.trim().to_string()))
                .filter(|(collection, salt)| !collection.is_empty() && !salt.is_empty())
                .ok_or_else(|| {
                    CryptoError::Configuration(format!(
                        "Invalid salt override '{entry}', expected collection=salt"
                    ))
                })
        })
        .collect()
}
