use crate::error::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Key derivation result
pub type KdfResult<T> = Result<T, CryptoError>;

/// Key Derivation Function utilities
pub struct Kdf;

impl Kdf {
    /// HKDF (HMAC-based Key Derivation Function) - RFC 5869
    ///
    /// Use this to derive multiple keys from a single master key.
    ///
    /// # Arguments
    /// * `ikm` - Input key material (the deployment secret)
    /// * `salt` - Salt value (the per-field-set salt)
    /// * `info` - Context and application specific information
    /// * `length` - Length of output key material
    pub fn hkdf(
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        length: usize,
    ) -> KdfResult<Zeroizing<Vec<u8>>> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = Zeroizing::new(vec![0u8; length]);

        hkdf.expand(info, &mut okm)
            .map_err(|_| CryptoError::KeyDerivationFailed(
                "HKDF expand failed".to_string()
            ))?;

        Ok(okm)
    }

    /// Derive a fixed-size array with HKDF
    pub fn hkdf_array<const N: usize>(
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
    ) -> KdfResult<Zeroizing<[u8; N]>> {
        let derived = Self::hkdf(ikm, salt, info, N)?;
        let mut out = Zeroizing::new([0u8; N]);
        out.copy_from_slice(&derived);
        Ok(out)
    }

    /// Derive the field encryption key for one (secret, salt, version) triple
    pub fn derive_field_key(
        secret: &[u8],
        salt: &[u8],
        key_version: u32,
    ) -> KdfResult<Zeroizing<[u8; 32]>> {
        let info = format!("intake-field-key-v{key_version}");
        Self::hkdf_array::<32>(secret, salt, info.as_bytes())
    }

    /// Derive the synthetic nonce used by deterministic field encryption
    pub fn derive_field_nonce(
        secret: &[u8],
        salt: &[u8],
        key_version: u32,
    ) -> KdfResult<[u8; 12]> {
        let info = format!("intake-field-nonce-v{key_version}");
        let derived = Self::hkdf_array::<12>(secret, salt, info.as_bytes())?;
        Ok(*derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hkdf_derivation() {
        let master_key = b"master_secret_key_material";
        let salt = b"random_salt";
        let info = b"application_context";

        let key1 = Kdf::hkdf(master_key, salt, info, 32).unwrap();
        let key2 = Kdf::hkdf(master_key, salt, info, 32).unwrap();

        // Same inputs should produce same output
        assert_eq!(*key1, *key2);
        assert_eq!(key1.len(), 32);
    }

    #[test]
    fn test_hkdf_different_contexts() {
        let master_key = b"master_secret";
        let salt = b"salt";

        let key1 = Kdf::hkdf(master_key, salt, b"context1", 32).unwrap();
        let key2 = Kdf::hkdf(master_key, salt, b"context2", 32).unwrap();

        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_field_key_depends_on_salt_and_version() {
        let secret = b"deployment-secret-value";

        let base = Kdf::derive_field_key(secret, b"salt-a", 1).unwrap();
        let other_salt = Kdf::derive_field_key(secret, b"salt-b", 1).unwrap();
        let other_version = Kdf::derive_field_key(secret, b"salt-a", 2).unwrap();

        assert_ne!(*base, *other_salt);
        assert_ne!(*base, *other_version);
    }

    #[test]
    fn test_nonce_and_key_are_independent() {
        let secret = b"deployment-secret-value";
        let key = Kdf::derive_field_key(secret, b"abc", 1).unwrap();
        let nonce = Kdf::derive_field_nonce(secret, b"abc", 1).unwrap();

        assert_ne!(&key[..12], &nonce[..]);
    }

    #[test]
    fn test_hkdf_rejects_oversized_output() {
        // RFC 5869 caps output at 255 * HashLen bytes
        assert!(Kdf::hkdf(b"ikm", b"salt", b"info", 255 * 32 + 1).is_err());
    }
}
