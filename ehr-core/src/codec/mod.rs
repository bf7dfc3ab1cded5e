//! Record Codec
//!
//! Encrypts documents for the local record store and computes the content
//! hash that the ledger attests to.
//!
//! Encryption is randomized (fresh nonce per seal); decryption and hashing
//! are deterministic. The hash is computed over the plaintext, never over
//! the ciphertext, so re-encrypting a document does not change what the
//! ledger sees.

mod cipher;
mod key_store;

pub use cipher::RecordCipher;
pub use key_store::{
    KeyMaterial, KeyProvider, KeyProviderError, LocalKeyProvider, StaticKeyProvider, KEY_SIZE,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreResult;
use crate::types::EhrDocument;

/// Lowercase hex SHA-256 of a document's canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash raw bytes
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Wrap a hash string read back from the ledger
    pub fn from_ledger(value: impl Into<String>) -> Self {
        Self(value.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Symmetric codec for clinical documents
pub struct RecordCodec {
    cipher: RecordCipher,
}

impl RecordCodec {
    /// Codec over caller-supplied key material
    pub fn with_key_material(key_ref: impl Into<String>, key: KeyMaterial) -> CoreResult<Self> {
        Ok(Self {
            cipher: RecordCipher::new(key_ref, &key)?,
        })
    }

    /// Codec over a key fetched from a provider
    pub async fn from_key_provider<P: KeyProvider + ?Sized>(
        provider: &P,
        key_ref: &str,
    ) -> CoreResult<Self> {
        let key = provider.get_key(key_ref).await?;
        Self::with_key_material(key_ref, key)
    }

    pub fn key_ref(&self) -> &str {
        self.cipher.key_ref()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        self.cipher.seal(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> CoreResult<Vec<u8>> {
        self.cipher.open(ciphertext)
    }

    pub fn encrypt_document(&self, doc: &EhrDocument) -> CoreResult<Vec<u8>> {
        self.encrypt(&doc.canonical_bytes()?)
    }

    pub fn decrypt_document(&self, ciphertext: &[u8]) -> CoreResult<EhrDocument> {
        let plaintext = self.decrypt(ciphertext)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Content hash of a document
    pub fn hash(&self, doc: &EhrDocument) -> CoreResult<ContentHash> {
        Ok(ContentHash::of_bytes(&doc.canonical_bytes()?))
    }
}

impl fmt::Debug for RecordCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCodec")
            .field("key_ref", &self.key_ref())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn codec() -> RecordCodec {
        RecordCodec::with_key_material("ehr:v1", KeyMaterial::new(vec![9; KEY_SIZE])).unwrap()
    }

    fn document() -> EhrDocument {
        EhrDocument {
            diagnosis: "Hypertension".to_string(),
            medications: "Lisinopril 10mg".to_string(),
            vital_signs: "BP 150/95".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let codec = codec();
        let doc = document();
        let sealed = codec.encrypt_document(&doc).unwrap();
        assert_eq!(codec.decrypt_document(&sealed).unwrap(), doc);
    }

    #[test]
    fn test_bytes_roundtrip_across_lengths() {
        use rand::{Rng, RngCore};

        let codec = codec();
        let mut rng = rand::thread_rng();
        let mut lengths = vec![0, 1, 15, 16, 17, 255, 256, 4096, 65_537];
        lengths.extend((0..32).map(|_| rng.gen_range(0..2048)));

        for len in lengths {
            let mut plaintext = vec![0u8; len];
            rng.fill_bytes(&mut plaintext);
            let sealed = codec.encrypt(&plaintext).unwrap();
            assert!(sealed.len() > plaintext.len());
            assert_eq!(codec.decrypt(&sealed).unwrap(), plaintext, "length {}", len);
        }
    }

    #[test]
    fn test_hash_is_deterministic_across_encryptions() {
        let codec = codec();
        let doc = document();
        let a = codec.encrypt_document(&doc).unwrap();
        let b = codec.encrypt_document(&doc).unwrap();
        assert_ne!(a, b);

        let ha = codec.hash(&codec.decrypt_document(&a).unwrap()).unwrap();
        let hb = codec.hash(&codec.decrypt_document(&b).unwrap()).unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha.as_str().len(), 64);
    }

    #[test]
    fn test_any_field_change_changes_hash() {
        let codec = codec();
        let base = codec.hash(&document()).unwrap();

        let mut changed = document();
        changed.allergies = "penicillin".to_string();
        assert_ne!(codec.hash(&changed).unwrap(), base);
    }

    #[test]
    fn test_empty_document_hash_is_stable() {
        let codec = codec();
        let a = codec.hash(&EhrDocument::empty()).unwrap();
        let b = ContentHash::of_bytes(&EhrDocument::empty().canonical_bytes().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_to_decrypt() {
        let sealed = codec().encrypt_document(&document()).unwrap();
        let other =
            RecordCodec::with_key_material("ehr:v1", KeyMaterial::new(vec![1; KEY_SIZE])).unwrap();
        assert!(matches!(
            other.decrypt_document(&sealed),
            Err(CoreError::Decryption(_))
        ));
    }

    #[test]
    fn test_ledger_hash_normalised_to_lowercase() {
        let h = ContentHash::from_ledger("ABCDEF");
        assert_eq!(h.as_str(), "abcdef");
        assert_eq!(serde_json::to_string(&h).unwrap(), "\"abcdef\"");
    }

    #[tokio::test]
    async fn test_codec_from_provider() {
        let provider = StaticKeyProvider::from_hex(
            "ehr:v1",
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        )
        .unwrap();
        let codec = RecordCodec::from_key_provider(&provider, "ehr:v1").await.unwrap();
        assert_eq!(codec.key_ref(), "ehr:v1");

        let missing = RecordCodec::from_key_provider(&provider, "ehr:v9").await;
        assert!(matches!(missing, Err(CoreError::KeyManagement(_))));
    }
}
