//! Encrypted Record Vault
//!
//! Pairs the record store with the codec. Plaintext never reaches the store
//! and the content hash is always recomputed from decrypted content.

use std::sync::Arc;

use ehr_core::types::{EhrDocument, EncryptedRecord};
use ehr_core::{ContentHash, RecordCodec};
use ehr_store::RecordStore;

use crate::error::{BridgeError, BridgeResult};

/// A document sealed for storage, with the hash of its plaintext
#[derive(Debug, Clone)]
pub struct SealedDocument {
    pub record: EncryptedRecord,
    pub hash: ContentHash,
}

pub struct RecordVault {
    records: Arc<dyn RecordStore>,
    codec: Arc<RecordCodec>,
}

impl RecordVault {
    pub fn new(records: Arc<dyn RecordStore>, codec: Arc<RecordCodec>) -> Self {
        Self { records, codec }
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// Decrypted document, if the patient has one
    pub async fn load(&self, patient_id: &str) -> BridgeResult<Option<EhrDocument>> {
        match self.records.get_record(patient_id).await? {
            Some(record) => Ok(Some(self.codec.decrypt_document(&record.ciphertext)?)),
            None => Ok(None),
        }
    }

    pub async fn load_required(&self, patient_id: &str) -> BridgeResult<EhrDocument> {
        self.load(patient_id)
            .await?
            .ok_or_else(|| BridgeError::RecordNotFound(patient_id.to_string()))
    }

    /// Hash of the patient's current content, or of the empty document when
    /// nothing is stored yet
    pub async fn content_hash(&self, patient_id: &str) -> BridgeResult<ContentHash> {
        let doc = self.load(patient_id).await?.unwrap_or_else(EhrDocument::empty);
        Ok(self.codec.hash(&doc)?)
    }

    /// Encrypt and hash without touching the store
    pub fn seal(&self, patient_id: &str, doc: &EhrDocument) -> BridgeResult<SealedDocument> {
        let hash = self.codec.hash(doc)?;
        let ciphertext = self.codec.encrypt_document(doc)?;
        Ok(SealedDocument {
            record: EncryptedRecord::new(patient_id, ciphertext, self.codec.key_ref()),
            hash,
        })
    }

    /// Replace the stored ciphertext in one write
    pub async fn store(&self, sealed: &SealedDocument) -> BridgeResult<()> {
        self.records.put_record(&sealed.record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehr_core::KeyMaterial;
    use ehr_store::MemoryStore;

    fn vault() -> RecordVault {
        let codec = RecordCodec::with_key_material("ehr:test", KeyMaterial::new(vec![9; 32])).unwrap();
        RecordVault::new(Arc::new(MemoryStore::new()), Arc::new(codec))
    }

    #[tokio::test]
    async fn test_absent_record_hashes_as_empty() {
        let vault = vault();
        let expected = vault.codec().hash(&EhrDocument::empty()).unwrap();
        assert_eq!(vault.content_hash("pt1").await.unwrap(), expected);
        assert!(matches!(
            vault.load_required("pt1").await,
            Err(BridgeError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let vault = vault();
        let doc = EhrDocument {
            allergies: "penicillin".into(),
            ..EhrDocument::empty()
        };
        let sealed = vault.seal("pt1", &doc).unwrap();
        assert_eq!(sealed.record.key_ref, "ehr:test");
        assert_ne!(sealed.record.ciphertext, doc.canonical_bytes().unwrap());

        vault.store(&sealed).await.unwrap();
        assert_eq!(vault.load_required("pt1").await.unwrap(), doc);
        assert_eq!(vault.content_hash("pt1").await.unwrap(), sealed.hash);
    }
}
