use crate::core::Result;
use crate::crypto::primitive::CipherPrimitive;
use std::sync::Arc;

/// Classification of a stored field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    Plaintext,
    Ciphertext,
}

/// Wraps the cipher primitive and adds the idempotency guard used by
/// the migration batch: a value is treated as already encrypted when it
/// decrypts successfully under the active key.
///
/// The decrypt probe is a heuristic, not a format tag. A plaintext that
/// happens to parse as valid nonce||ciphertext||tag under the active
/// key would be misclassified and skipped; with an authenticated cipher
/// the tag check makes that accidental collision negligible, but it is
/// an accepted approximation, not a cryptographic guarantee.
#[derive(Clone)]
pub struct EncryptionGateway {
    primitive: Arc<dyn CipherPrimitive>,
}

impl EncryptionGateway {
    pub fn new(primitive: Arc<dyn CipherPrimitive>) -> Self {
        Self { primitive }
    }

    pub fn encrypt_field(&self, plaintext: &str) -> Result<String> {
        self.primitive.encrypt(plaintext)
    }

    pub fn decrypt_field(&self, ciphertext: &str) -> Result<String> {
        self.primitive.decrypt(ciphertext)
    }

    /// Decrypt-probe the value and report which side of the encryption
    /// boundary it sits on.
    pub fn classify(&self, value: &str) -> ValueClass {
        match self.primitive.decrypt(value) {
            Ok(_) => ValueClass::Ciphertext,
            Err(_) => ValueClass::Plaintext,
        }
    }

    pub fn is_already_encrypted(&self, value: &str) -> bool {
        self.classify(value) == ValueClass::Ciphertext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::primitive::{AesGcmCipher, PassthroughCipher};

    fn gateway() -> EncryptionGateway {
        EncryptionGateway::new(Arc::new(AesGcmCipher::new(&[9u8; 32])))
    }

    #[test]
    fn test_classify_plaintext() {
        assert_eq!(gateway().classify("RS123456789"), ValueClass::Plaintext);
    }

    #[test]
    fn test_classify_ciphertext() {
        let gw = gateway();
        let ct = gw.encrypt_field("RS123456789").unwrap();
        assert_eq!(gw.classify(&ct), ValueClass::Ciphertext);
        assert!(gw.is_already_encrypted(&ct));
    }

    #[test]
    fn test_gateway_accepts_any_primitive() {
        let gw = EncryptionGateway::new(Arc::new(PassthroughCipher));
        // Passthrough "decrypts" everything, so everything classifies
        // as ciphertext; documented behavior of the test double.
        assert!(gw.is_already_encrypted("anything"));
    }
}
