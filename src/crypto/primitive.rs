use crate::core::{MigrationError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

/// Nonce size for AES-256-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// The symmetric encrypt/decrypt primitive the gateway wraps.
///
/// Implementations own the key material; callers never see raw keys.
/// `encrypt` must use a random IV per call, so repeated encryption of
/// identical plaintext yields different ciphertext. Never memoize on
/// plaintext.
pub trait CipherPrimitive: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// AES-256-GCM primitive with base64 transport encoding.
///
/// Ciphertext layout: base64(nonce || ciphertext || tag).
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key_bytes: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Generate a fresh random 256-bit key.
    pub fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }
}

impl CipherPrimitive for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| MigrationError::Encryption(format!("AES-GCM encrypt failed: {}", e)))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let combined = STANDARD
            .decode(ciphertext)
            .map_err(|e| MigrationError::Encryption(format!("invalid base64: {}", e)))?;

        if combined.len() < NONCE_SIZE {
            return Err(MigrationError::Encryption(
                "ciphertext shorter than nonce".to_string(),
            ));
        }

        let (nonce_bytes, payload) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, payload)
            .map_err(|e| MigrationError::Encryption(format!("AES-GCM decrypt failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| MigrationError::Encryption(format!("decrypted bytes not UTF-8: {}", e)))
    }
}

/// No-op primitive for tests: data passes through unchanged. Note that
/// under passthrough every value "decrypts", so the gateway classifies
/// everything as ciphertext.
pub struct PassthroughCipher;

impl CipherPrimitive for PassthroughCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        Ok(ciphertext.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cipher = AesGcmCipher::new(&[7u8; 32]);
        let ct = cipher.encrypt("064-123-4567").unwrap();
        assert_ne!(ct, "064-123-4567");
        assert_eq!(cipher.decrypt(&ct).unwrap(), "064-123-4567");
    }

    #[test]
    fn test_random_iv_per_call() {
        let cipher = AesGcmCipher::new(&[7u8; 32]);
        let a = cipher.encrypt("same input").unwrap();
        let b = cipher.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_rejects_plaintext() {
        let cipher = AesGcmCipher::new(&[7u8; 32]);
        assert!(cipher.decrypt("just some plaintext").is_err());
    }

    #[test]
    fn test_decrypt_rejects_wrong_key() {
        let ct = AesGcmCipher::new(&[1u8; 32]).encrypt("secret").unwrap();
        assert!(AesGcmCipher::new(&[2u8; 32]).decrypt(&ct).is_err());
    }
}
