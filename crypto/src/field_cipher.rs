use crate::config::{CipherConfig, EncryptionMode};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::Kdf;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm,
};
use aes_gcm_siv::Aes256GcmSiv;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use secrecy::ExposeSecret;
use zeroize::ZeroizeOnDrop;

/// Nonce length shared by AES-GCM and AES-GCM-SIV (96 bits)
pub const NONCE_LEN: usize = 12;

/// Authentication tag length appended to every ciphertext
pub const TAG_LEN: usize = 16;

const ALG_SIV: &str = "siv";
const ALG_GCM: &str = "gcm";

/// Symmetric cipher for single field values
///
/// Keys are derived from the deployment secret and a field-set salt with
/// HKDF-SHA256. Two modes are supported:
/// - **Deterministic**: AES-256-GCM-SIV with a nonce derived from the same
///   (secret, salt) pair. Identical plaintexts produce identical ciphertexts,
///   which is what equality lookups on encrypted columns rely on.
/// - **Randomized**: AES-256-GCM with a random 96-bit nonce per value.
///
/// Output format: `v{version}:{alg}:{nonce_b64}:{ciphertext_b64}`. The
/// algorithm tag is part of the value, so a cipher can read values written
/// in either mode as long as the key material matches.
#[derive(ZeroizeOnDrop)]
pub struct FieldCipher {
    #[zeroize(skip)]
    gcm: Aes256Gcm,
    #[zeroize(skip)]
    siv: Aes256GcmSiv,
    /// Derived key - automatically zeroized on drop
    key: [u8; 32],
    siv_nonce: [u8; NONCE_LEN],
    key_version: u32,
    #[zeroize(skip)]
    mode: EncryptionMode,
}

impl FieldCipher {
    /// Create a version 1 cipher from raw secret and salt bytes
    pub fn new(secret: &[u8], salt: &[u8], mode: EncryptionMode) -> CryptoResult<Self> {
        Self::derive(secret, salt, 1, mode)
    }

    /// Create a cipher for an explicit key version
    pub fn derive(
        secret: &[u8],
        salt: &[u8],
        key_version: u32,
        mode: EncryptionMode,
    ) -> CryptoResult<Self> {
        if secret.is_empty() {
            return Err(CryptoError::Configuration(
                "encryption secret is missing".to_string(),
            ));
        }
        if salt.is_empty() {
            return Err(CryptoError::Configuration(
                "encryption salt is missing".to_string(),
            ));
        }

        let derived = Kdf::derive_field_key(secret, salt, key_version)?;
        let siv_nonce = Kdf::derive_field_nonce(secret, salt, key_version)?;

        let gcm = Aes256Gcm::new_from_slice(derived.as_slice())
            .map_err(|_| CryptoError::InvalidKey("derived key rejected by AES-GCM".to_string()))?;
        let siv = Aes256GcmSiv::new_from_slice(derived.as_slice())
            .map_err(|_| CryptoError::InvalidKey("derived key rejected by AES-GCM-SIV".to_string()))?;

        Ok(Self {
            gcm,
            siv,
            key: *derived,
            siv_nonce,
            key_version,
            mode,
        })
    }

    /// Create the cipher for one collection's field set
    pub fn from_config(
        config: &CipherConfig,
        collection: &str,
        mode: EncryptionMode,
    ) -> CryptoResult<Self> {
        Self::derive(
            config.secret.expose_secret().as_bytes(),
            config.salt_for(collection).as_bytes(),
            config.key_version,
            mode,
        )
    }

    /// Get the current key version
    pub fn version(&self) -> u32 {
        self.key_version
    }

    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Encrypt a canonical string representation
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let (alg, nonce_bytes, ciphertext) = match self.mode {
            EncryptionMode::Deterministic => {
                let nonce = aes_gcm_siv::Nonce::from_slice(&self.siv_nonce);
                let ciphertext = self
                    .siv
                    .encrypt(nonce, plaintext.as_bytes())
                    .map_err(|_| CryptoError::EncryptionFailed("AES-GCM-SIV seal failed".to_string()))?;
                (ALG_SIV, self.siv_nonce, ciphertext)
            }
            EncryptionMode::Randomized => {
                let mut nonce_bytes = [0u8; NONCE_LEN];
                OsRng.fill_bytes(&mut nonce_bytes);
                let nonce = aes_gcm::Nonce::from_slice(&nonce_bytes);
                let ciphertext = self
                    .gcm
                    .encrypt(nonce, plaintext.as_bytes())
                    .map_err(|_| CryptoError::EncryptionFailed("AES-GCM seal failed".to_string()))?;
                (ALG_GCM, nonce_bytes, ciphertext)
            }
        };

        Ok(format!(
            "v{}:{}:{}:{}",
            self.key_version,
            alg,
            BASE64.encode(nonce_bytes),
            BASE64.encode(&ciphertext)
        ))
    }

    /// Decrypt a value produced by [`FieldCipher::encrypt`]
    pub fn decrypt(&self, encrypted: &str) -> CryptoResult<String> {
        let parsed = ParsedValue::parse(encrypted)?;

        if parsed.version != self.key_version {
            return Err(CryptoError::UnsupportedKeyVersion {
                version: parsed.version,
                supported: self.key_version,
            });
        }

        let plaintext = match parsed.alg {
            ALG_SIV => self
                .siv
                .decrypt(aes_gcm_siv::Nonce::from_slice(&parsed.nonce), parsed.ciphertext.as_ref()),
            _ => self
                .gcm
                .decrypt(aes_gcm::Nonce::from_slice(&parsed.nonce), parsed.ciphertext.as_ref()),
        }
        .map_err(|_| CryptoError::DecryptionFailed("authentication tag mismatch".to_string()))?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Whether `value` has the shape of an encrypted field value
    ///
    /// Does not check the key; a value from another deployment still
    /// "looks encrypted" and then fails in [`FieldCipher::decrypt`].
    pub fn looks_encrypted(value: &str) -> bool {
        ParsedValue::parse(value).is_ok()
    }
}

struct ParsedValue {
    version: u32,
    alg: &'static str,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl ParsedValue {
    fn parse(encrypted: &str) -> CryptoResult<Self> {
        let mut parts = encrypted.splitn(4, ':');
        let (Some(version), Some(alg), Some(nonce), Some(ciphertext)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::InvalidFormat("expected four ':'-separated parts".to_string()));
        };

        let version = version
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| CryptoError::InvalidFormat("missing version prefix".to_string()))?;

        let alg = match alg {
            ALG_SIV => ALG_SIV,
            ALG_GCM => ALG_GCM,
            other => {
                return Err(CryptoError::InvalidFormat(format!("unknown algorithm tag '{other}'")))
            }
        };

        let nonce_bytes = BASE64
            .decode(nonce)
            .map_err(|_| CryptoError::InvalidFormat("nonce is not base64".to_string()))?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidFormat("invalid nonce length".to_string()))?;

        let ciphertext = BASE64
            .decode(ciphertext)
            .map_err(|_| CryptoError::InvalidFormat("ciphertext is not base64".to_string()))?;
        if ciphertext.len() < TAG_LEN {
            return Err(CryptoError::InvalidFormat("ciphertext shorter than tag".to_string()));
        }

        Ok(Self {
            version,
            alg,
            nonce,
            ciphertext,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic() -> FieldCipher {
        FieldCipher::new(b"test-deployment-secret", b"abc", EncryptionMode::Deterministic).unwrap()
    }

    fn randomized() -> FieldCipher {
        FieldCipher::new(b"test-deployment-secret", b"abc", EncryptionMode::Randomized).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        for cipher in [deterministic(), randomized()] {
            let encrypted = cipher.encrypt("Sensitive PHI data").unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), "Sensitive PHI data");
        }
    }

    #[test]
    fn test_deterministic_mode_is_byte_identical() {
        let first = deterministic().encrypt("a@b.com").unwrap();
        let second = deterministic().encrypt("a@b.com").unwrap();

        assert_eq!(first, second);
        assert_ne!(first, deterministic().encrypt("c@d.com").unwrap());
    }

    #[test]
    fn test_randomized_mode_uses_fresh_nonces() {
        let cipher = randomized();
        let encrypted1 = cipher.encrypt("same plaintext").unwrap();
        let encrypted2 = cipher.encrypt("same plaintext").unwrap();

        assert_ne!(encrypted1, encrypted2);
        assert_eq!(cipher.decrypt(&encrypted1).unwrap(), "same plaintext");
        assert_eq!(cipher.decrypt(&encrypted2).unwrap(), "same plaintext");
    }

    #[test]
    fn test_versioned_format() {
        let cipher =
            FieldCipher::derive(b"test-deployment-secret", b"abc", 5, EncryptionMode::Deterministic)
                .unwrap();
        let encrypted = cipher.encrypt("test data").unwrap();

        assert!(encrypted.starts_with("v5:siv:"));
        assert_eq!(encrypted.split(':').count(), 4);
        assert!(randomized().encrypt("x").unwrap().starts_with("v1:gcm:"));
    }

    #[test]
    fn test_modes_read_each_other() {
        let written = randomized().encrypt("cross mode").unwrap();
        assert_eq!(deterministic().decrypt(&written).unwrap(), "cross mode");
    }

    #[test]
    fn test_wrong_secret_fails() {
        let encrypted = deterministic().encrypt("secret value").unwrap();
        let other =
            FieldCipher::new(b"another-deployment-secret", b"abc", EncryptionMode::Deterministic)
                .unwrap();

        assert!(matches!(
            other.decrypt(&encrypted),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_wrong_salt_fails() {
        let encrypted = deterministic().encrypt("secret value").unwrap();
        let other =
            FieldCipher::new(b"test-deployment-secret", b"xyz", EncryptionMode::Deterministic)
                .unwrap();

        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_tampered_ciphertext() {
        let cipher = randomized();
        let encrypted = cipher.encrypt("authenticated data").unwrap();
        let (head, body) = encrypted.rsplit_once(':').unwrap();
        let mut bytes = BASE64.decode(body).unwrap();
        bytes[0] ^= 0x01;
        let tampered = format!("{head}:{}", BASE64.encode(bytes));

        assert!(matches!(
            cipher.decrypt(&tampered),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_wrong_version() {
        let v1 = FieldCipher::derive(b"test-deployment-secret", b"abc", 1, EncryptionMode::Randomized)
            .unwrap();
        let v2 = FieldCipher::derive(b"test-deployment-secret", b"abc", 2, EncryptionMode::Randomized)
            .unwrap();

        let encrypted = v1.encrypt("version test").unwrap();
        assert_eq!(
            v2.decrypt(&encrypted),
            Err(CryptoError::UnsupportedKeyVersion { version: 1, supported: 2 })
        );
    }

    #[test]
    fn test_plaintext_is_not_decryptable() {
        let cipher = deterministic();
        assert!(matches!(
            cipher.decrypt("1990-01-01"),
            Err(CryptoError::InvalidFormat(_))
        ));
        assert!(cipher.decrypt("v1:siv:not-base64!:abc").is_err());
    }

    #[test]
    fn test_looks_encrypted() {
        let encrypted = deterministic().encrypt("1990-01-01").unwrap();

        assert!(FieldCipher::looks_encrypted(&encrypted));
        assert!(!FieldCipher::looks_encrypted("1990-01-01"));
        assert!(!FieldCipher::looks_encrypted("12:30:45:00"));
        assert!(!FieldCipher::looks_encrypted("v1:aes:AAAA:BBBB"));
    }

    #[test]
    fn test_empty_and_unicode_plaintext() {
        let cipher = deterministic();
        for plaintext in ["", "Müller – 头痛 🤕"] {
            let encrypted = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        assert!(matches!(
            FieldCipher::new(b"", b"abc", EncryptionMode::Deterministic),
            Err(CryptoError::Configuration(_))
        ));
        assert!(matches!(
            FieldCipher::new(b"secret", b"", EncryptionMode::Deterministic),
            Err(CryptoError::Configuration(_))
        ));
    }

    #[test]
    fn test_short_secret_accepted_by_cipher() {
        let cipher = FieldCipher::new(b"s", b"abc", EncryptionMode::Deterministic).unwrap();
        let encrypted = cipher.encrypt("a@b.com").unwrap();
        assert_ne!(encrypted, "a@b.com");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "a@b.com");
    }

    #[test]
    fn test_from_config_honours_salt_override() {
        let config = CipherConfig::new("a-sufficiently-long-secret", "default-salt")
            .with_salt_override("injuries", "injury-salt");

        let injuries =
            FieldCipher::from_config(&config, "injuries", EncryptionMode::Deterministic).unwrap();
        let headache =
            FieldCipher::from_config(&config, "headache", EncryptionMode::Deterministic).unwrap();

        assert_ne!(injuries.encrypt("x").unwrap(), headache.encrypt("x").unwrap());
    }
}
