use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unsupported key version {version}, only version {supported} is supported")]
    UnsupportedKeyVersion { version: u32, supported: u32 },

    #[error("Invalid encrypted data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid UTF-8 in decrypted data")]
    InvalidUtf8,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CryptoError {
    /// True for every failure that happens while reading a value back.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            Self::DecryptionFailed(_)
                | Self::InvalidFormat(_)
                | Self::InvalidUtf8
                | Self::UnsupportedKeyVersion { .. }
        )
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
