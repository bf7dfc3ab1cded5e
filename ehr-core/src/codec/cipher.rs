//! Record Cipher
//!
//! ChaCha20-Poly1305 AEAD over the serialized record.
//!
//! # Wire Layout
//!
//! ```text
//! ┌─────────┬──────────────┬──────────────────────────────┐
//! │ version │ nonce (12 B) │ ciphertext ‖ tag (16 B)      │
//! └─────────┴──────────────┴──────────────────────────────┘
//! ```
//!
//! The key reference is bound as additional authenticated data, so a blob
//! sealed under one key reference fails to open under another even if the
//! key bytes happen to match.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;

use super::key_store::{KeyMaterial, KEY_SIZE};
use crate::error::{CoreError, CoreResult};

/// Current layout version
const CIPHER_VERSION: u8 = 1;

/// ChaCha20-Poly1305 nonce size (12 bytes)
const NONCE_SIZE: usize = 12;

/// Poly1305 tag size
const TAG_SIZE: usize = 16;

/// Symmetric cipher bound to one key
pub struct RecordCipher {
    key_ref: String,
    aead: ChaCha20Poly1305,
}

impl RecordCipher {
    pub fn new(key_ref: impl Into<String>, key: &KeyMaterial) -> CoreResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(CoreError::KeyManagement(format!(
                "Record key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }
        let aead = ChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|e| CoreError::KeyManagement(format!("Cipher init failed: {}", e)))?;
        Ok(Self {
            key_ref: key_ref.into(),
            aead,
        })
    }

    pub fn key_ref(&self) -> &str {
        &self.key_ref
    }

    /// Encrypt with a fresh random nonce
    pub fn seal(&self, plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: self.key_ref.as_bytes(),
                },
            )
            .map_err(|e| CoreError::Encryption(format!("Record encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        out.push(CIPHER_VERSION);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a blob produced by [`RecordCipher::seal`]
    pub fn open(&self, sealed: &[u8]) -> CoreResult<Vec<u8>> {
        if sealed.len() < 1 + NONCE_SIZE + TAG_SIZE {
            return Err(CoreError::Decryption(format!(
                "Ciphertext too short: {} bytes",
                sealed.len()
            )));
        }
        if sealed[0] != CIPHER_VERSION {
            return Err(CoreError::Decryption(format!(
                "Unsupported cipher version: {}",
                sealed[0]
            )));
        }

        let nonce = Nonce::from_slice(&sealed[1..1 + NONCE_SIZE]);
        self.aead
            .decrypt(
                nonce,
                Payload {
                    msg: &sealed[1 + NONCE_SIZE..],
                    aad: self.key_ref.as_bytes(),
                },
            )
            .map_err(|e| CoreError::Decryption(format!("Record decryption failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> KeyMaterial {
        KeyMaterial::new(vec![byte; KEY_SIZE])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = RecordCipher::new("ehr:v1", &key(7)).unwrap();
        let sealed = cipher.seal(b"diagnosis: flu").unwrap();
        assert_eq!(sealed[0], CIPHER_VERSION);
        assert_eq!(cipher.open(&sealed).unwrap(), b"diagnosis: flu");
    }

    #[test]
    fn test_nonces_differ_between_seals() {
        let cipher = RecordCipher::new("ehr:v1", &key(7)).unwrap();
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_rejects_tampering() {
        let cipher = RecordCipher::new("ehr:v1", &key(7)).unwrap();
        let mut sealed = cipher.seal(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(cipher.open(&sealed), Err(CoreError::Decryption(_))));
    }

    #[test]
    fn test_key_ref_is_bound() {
        let a = RecordCipher::new("ehr:v1", &key(7)).unwrap();
        let b = RecordCipher::new("ehr:v2", &key(7)).unwrap();
        let sealed = a.seal(b"payload").unwrap();
        assert!(b.open(&sealed).is_err());
    }

    #[test]
    fn test_rejects_wrong_key_size_and_short_input() {
        assert!(RecordCipher::new("ehr:v1", &KeyMaterial::new(vec![1; 16])).is_err());
        let cipher = RecordCipher::new("ehr:v1", &key(7)).unwrap();
        assert!(cipher.open(&[CIPHER_VERSION, 0, 0]).is_err());
    }
}
