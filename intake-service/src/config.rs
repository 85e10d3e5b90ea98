//! Service configuration
//!
//! Loaded once at startup from the process environment (and a `.env` file
//! when present). The cipher configuration derived here is handed to the
//! record registry; nothing downstream reads the environment again.

use crate::error::{IntakeError, IntakeResult};
use crate::records::RecordKind;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use crypto::{CipherConfig, EncryptionMode};
use logger_redacted::{LogFormat, LoggerConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_COMPOSITE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
struct RawIntakeConfig {
    encryption_secret: Option<String>,
    encryption_salt: Option<String>,
    encryption_key_version: u32,
    encryption_salt_overrides: Option<String>,
    deterministic_collections: Option<String>,
    composite_timeout_ms: u64,
    database_url: Option<String>,
    log_level: String,
    log_format: String,
}

#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub cipher: CipherConfig,
    /// Collections switched to deterministic encryption as a whole
    pub deterministic_collections: HashSet<String>,
    pub composite_timeout: Duration,
    pub database_url: Option<String>,
    pub logger: LoggerConfig,
}

impl IntakeConfig {
    /// Load `.env`, then read the process environment
    pub fn load() -> IntakeResult<Self> {
        // A missing .env file is normal outside development
        let _ = dotenvy::dotenv();
        Self::build(Config::builder().add_source(Environment::default()))
    }

    /// Build from explicit key/value pairs (keys as environment variable names)
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> IntakeResult<Self> {
        let builder = pairs
            .into_iter()
            .try_fold(Config::builder(), |builder, (key, value)| {
                builder.set_override(key.to_lowercase(), value)
            })
            .map_err(|e| IntakeError::Configuration(e.to_string()))?;
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> IntakeResult<Self> {
        let raw: RawIntakeConfig = builder
            .set_default("encryption_key_version", 1)
            .and_then(|b| b.set_default("composite_timeout_ms", DEFAULT_COMPOSITE_TIMEOUT_MS))
            .and_then(|b| b.set_default("log_level", "info"))
            .and_then(|b| b.set_default("log_format", "pretty"))
            .and_then(|b| b.build())
            .and_then(|config| config.try_deserialize())
            .map_err(|e| IntakeError::Configuration(e.to_string()))?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawIntakeConfig) -> IntakeResult<Self> {
        let secret = raw
            .encryption_secret
            .ok_or_else(|| IntakeError::Configuration("ENCRYPTION_SECRET is required".to_string()))?;
        let salt = raw
            .encryption_salt
            .ok_or_else(|| IntakeError::Configuration("ENCRYPTION_SALT is required".to_string()))?;

        let cipher = CipherConfig::from_settings(
            secret,
            salt,
            raw.encryption_key_version,
            raw.encryption_salt_overrides.as_deref(),
        )?;

        let deterministic_collections = parse_collections(raw.deterministic_collections.as_deref())?;

        let format: LogFormat = raw
            .log_format
            .parse()
            .map_err(|e: logger_redacted::LoggerError| IntakeError::Configuration(e.to_string()))?;

        let config = Self {
            cipher,
            deterministic_collections,
            composite_timeout: Duration::from_millis(raw.composite_timeout_ms),
            database_url: raw.database_url.filter(|url| !url.trim().is_empty()),
            logger: LoggerConfig {
                log_level: raw.log_level,
                format,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration; failures are fatal at startup
    pub fn validate(&self) -> IntakeResult<()> {
        self.cipher.validate()?;

        for collection in self.cipher.salt_overrides.keys() {
            if RecordKind::from_collection(collection).is_none() {
                return Err(IntakeError::Configuration(format!(
                    "Salt override names unknown collection '{collection}'"
                )));
            }
        }

        if self.composite_timeout.is_zero() {
            return Err(IntakeError::Configuration(
                "COMPOSITE_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Encryption mode of a record type's field set in this deployment
    pub fn mode_for(&self, kind: RecordKind) -> EncryptionMode {
        if self.deterministic_collections.contains(kind.collection()) {
            EncryptionMode::Deterministic
        } else {
            kind.spec().default_mode
        }
    }
}

fn parse_collections(raw: Option<&str>) -> IntakeResult<HashSet<String>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            RecordKind::from_collection(name)
                .map(|kind| kind.collection().to_string())
                .ok_or_else(|| IntakeError::Configuration(format!("Unknown collection '{name}' in DETERMINISTIC_COLLECTIONS")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const SECRET: &str = "a-sufficiently-long-secret";

    #[test]
    fn test_from_pairs_with_defaults() {
        let config = IntakeConfig::from_pairs([
            ("ENCRYPTION_SECRET", SECRET),
            ("ENCRYPTION_SALT", "abc"),
        ])
        .unwrap();

        assert_eq!(config.cipher.secret.expose_secret(), SECRET);
        assert_eq!(config.cipher.key_version, 1);
        assert_eq!(config.composite_timeout, Duration::from_millis(DEFAULT_COMPOSITE_TIMEOUT_MS));
        assert_eq!(config.logger.format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        let result = IntakeConfig::from_pairs([("ENCRYPTION_SALT", "abc")]);
        assert!(matches!(result, Err(IntakeError::Configuration(_))));
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = IntakeConfig::from_pairs([("ENCRYPTION_SECRET", "s"), ("ENCRYPTION_SALT", "abc")]);
        assert!(matches!(result, Err(IntakeError::Configuration(_))));
    }

    #[test]
    fn test_overrides_and_deterministic_collections() {
        let config = IntakeConfig::from_pairs([
            ("ENCRYPTION_SECRET", SECRET),
            ("ENCRYPTION_SALT", "abc"),
            ("ENCRYPTION_SALT_OVERRIDES", "injuries=injury-salt"),
            ("DETERMINISTIC_COLLECTIONS", "allergies, headaches"),
            ("COMPOSITE_TIMEOUT_MS", "2500"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.cipher.salt_for("injuries"), "injury-salt");
        assert_eq!(config.mode_for(RecordKind::Allergies), EncryptionMode::Deterministic);
        assert_eq!(config.mode_for(RecordKind::Injury), EncryptionMode::Randomized);
        assert_eq!(config.mode_for(RecordKind::User), EncryptionMode::Deterministic);
        assert_eq!(config.composite_timeout, Duration::from_millis(2500));
        assert_eq!(config.logger.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_collections_rejected() {
        let result = IntakeConfig::from_pairs([
            ("ENCRYPTION_SECRET", SECRET),
            ("ENCRYPTION_SALT", "abc"),
            ("DETERMINISTIC_COLLECTIONS", "appointments"),
        ]);
        assert!(result.is_err());

        let result = IntakeConfig::from_pairs([
            ("ENCRYPTION_SECRET", SECRET),
            ("ENCRYPTION_SALT", "abc"),
            ("ENCRYPTION_SALT_OVERRIDES", "appointments=x"),
        ]);
        assert!(result.is_err());
    }
}
