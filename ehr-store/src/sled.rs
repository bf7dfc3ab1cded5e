//! Sled Persistent Stores
//!
//! # Trees
//!
//! | Tree              | Key                      | Value                   |
//! |-------------------|--------------------------|-------------------------|
//! | `access_requests` | `patient \0 doctor`      | JSON `AccessRequest`    |
//! | `doctor_index`    | `doctor \0 patient`      | empty                   |
//! | `records`         | `patient`                | JSON `EncryptedRecord`  |
//!
//! Lookup by patient is a prefix scan of `access_requests`; lookup by doctor
//! goes through `doctor_index`. The request and its index entry are written
//! in one transaction.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::TransactionResult;
use sled::Transactional;
use std::path::Path;

use ehr_core::types::{AccessRequest, AccessStatus, EncryptedRecord, PairKey};

use crate::error::{StoreError, StoreResult};
use crate::{RecordStore, StatusMirror};

const ACCESS_REQUESTS_TREE: &str = "access_requests";
const DOCTOR_INDEX_TREE: &str = "doctor_index";
const RECORDS_TREE: &str = "records";

const SEP: u8 = 0;

/// Sled-backed implementation of both stores
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
    requests: sled::Tree,
    doctor_index: sled::Tree,
    records: sled::Tree,
}

impl SledStore {
    /// Open or create a sled database
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)
            .map_err(|e| StoreError::Backend(format!("Failed to open sled db: {}", e)))?;
        let requests = db.open_tree(ACCESS_REQUESTS_TREE).map_err(|e| {
            StoreError::Backend(format!("Failed to open access_requests tree: {}", e))
        })?;
        let doctor_index = db
            .open_tree(DOCTOR_INDEX_TREE)
            .map_err(|e| StoreError::Backend(format!("Failed to open doctor_index tree: {}", e)))?;
        let records = db
            .open_tree(RECORDS_TREE)
            .map_err(|e| StoreError::Backend(format!("Failed to open records tree: {}", e)))?;

        Ok(Self {
            db,
            requests,
            doctor_index,
            records,
        })
    }

    /// Flush to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(format!("Failed to flush db: {}", e)))?;
        Ok(())
    }

    fn serialize<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn compound_key(first: &str, second: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(first.len() + second.len() + 1);
        key.extend_from_slice(first.as_bytes());
        key.push(SEP);
        key.extend_from_slice(second.as_bytes());
        key
    }

    fn prefix(first: &str) -> Vec<u8> {
        let mut key = first.as_bytes().to_vec();
        key.push(SEP);
        key
    }

    fn decode_request(key: &[u8], bytes: &[u8]) -> StoreResult<AccessRequest> {
        let request: AccessRequest = Self::deserialize(bytes)?;
        if Self::compound_key(&request.patient_id, &request.doctor_id) != key {
            return Err(StoreError::Corrupt {
                key: String::from_utf8_lossy(key).replace('\0', "/"),
                reason: format!("entry belongs to {}", request.pair()),
            });
        }
        Ok(request)
    }

    fn scan_requests<F>(&self, pred: F) -> StoreResult<Vec<AccessRequest>>
    where
        F: Fn(&AccessRequest) -> bool,
    {
        let mut out = Vec::new();
        for item in self.requests.iter() {
            let (key, value) = item
                .map_err(|e| StoreError::Backend(format!("Failed to iterate requests: {}", e)))?;
            let request = Self::decode_request(&key, &value)?;
            if pred(&request) {
                out.push(request);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl StatusMirror for SledStore {
    async fn get_request(&self, pair: &PairKey) -> StoreResult<Option<AccessRequest>> {
        let key = Self::compound_key(&pair.patient_id, &pair.doctor_id);
        match self
            .requests
            .get(&key)
            .map_err(|e| StoreError::Backend(format!("Failed to get request: {}", e)))?
        {
            Some(bytes) => Ok(Some(Self::decode_request(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_request(&self, request: &AccessRequest) -> StoreResult<()> {
        let key = Self::compound_key(&request.patient_id, &request.doctor_id);
        let index_key = Self::compound_key(&request.doctor_id, &request.patient_id);
        let value = Self::serialize(request)?;

        let result: TransactionResult<()> =
            (&self.requests, &self.doctor_index).transaction(|(requests, index)| {
                requests.insert(key.as_slice(), value.as_slice())?;
                index.insert(index_key.as_slice(), &[] as &[u8])?;
                Ok(())
            });
        result.map_err(|e| StoreError::Backend(format!("Failed to save request: {:?}", e)))?;

        tracing::debug!(
            patient_id = %request.patient_id,
            doctor_id = %request.doctor_id,
            status = %request.status,
            "Access request stored"
        );
        Ok(())
    }

    async fn requests_by_patient(&self, patient_id: &str) -> StoreResult<Vec<AccessRequest>> {
        let mut out = Vec::new();
        for item in self.requests.scan_prefix(Self::prefix(patient_id)) {
            let (key, value) = item
                .map_err(|e| StoreError::Backend(format!("Failed to scan requests: {}", e)))?;
            out.push(Self::decode_request(&key, &value)?);
        }
        Ok(out)
    }

    async fn requests_by_doctor(&self, doctor_id: &str) -> StoreResult<Vec<AccessRequest>> {
        let prefix = Self::prefix(doctor_id);
        let mut out = Vec::new();
        for item in self.doctor_index.scan_prefix(&prefix) {
            let (key, _) = item
                .map_err(|e| StoreError::Backend(format!("Failed to scan doctor index: {}", e)))?;
            let patient_id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            match self
                .get_request(&PairKey::new(patient_id.clone(), doctor_id))
                .await?
            {
                Some(request) => out.push(request),
                None => {
                    return Err(StoreError::Corrupt {
                        key: format!("{}/{}", doctor_id, patient_id),
                        reason: "index entry without request".to_string(),
                    })
                }
            }
        }
        Ok(out)
    }

    async fn requests_by_status(&self, status: AccessStatus) -> StoreResult<Vec<AccessRequest>> {
        self.scan_requests(|r| r.status == status)
    }
}

#[async_trait]
impl RecordStore for SledStore {
    async fn get_record(&self, patient_id: &str) -> StoreResult<Option<EncryptedRecord>> {
        match self
            .records
            .get(patient_id.as_bytes())
            .map_err(|e| StoreError::Backend(format!("Failed to get record: {}", e)))?
        {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_record(&self, record: &EncryptedRecord) -> StoreResult<()> {
        let value = Self::serialize(record)?;
        self.records
            .insert(record.patient_id.as_bytes(), value)
            .map_err(|e| StoreError::Backend(format!("Failed to save record: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sled_request_overwrite_keeps_single_entry() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        let mut req = AccessRequest::new("pt1", "dr1");
        store.put_request(&req).await.unwrap();
        req.set_status(AccessStatus::Revoked);
        store.put_request(&req).await.unwrap();

        let all = store.requests_by_patient("pt1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, AccessStatus::Revoked);
        assert_eq!(store.requests_by_doctor("dr1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sled_prefix_scan_does_not_bleed() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        store
            .put_request(&AccessRequest::new("pt1", "dr1"))
            .await
            .unwrap();
        store
            .put_request(&AccessRequest::new("pt10", "dr1"))
            .await
            .unwrap();

        let pt1 = store.requests_by_patient("pt1").await.unwrap();
        assert_eq!(pt1.len(), 1);
        assert_eq!(pt1[0].patient_id, "pt1");
        assert_eq!(store.requests_by_doctor("dr1").await.unwrap().len(), 2);
        assert!(store.requests_by_doctor("dr").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sled_status_lookup() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        let mut accepted = AccessRequest::new("pt1", "dr2");
        accepted.set_status(AccessStatus::Accepted);
        store.put_request(&accepted).await.unwrap();
        store
            .put_request(&AccessRequest::new("pt1", "dr1"))
            .await
            .unwrap();

        let found = store
            .requests_by_status(AccessStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].doctor_id, "dr2");
    }

    #[tokio::test]
    async fn test_sled_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store
                .put_record(&EncryptedRecord::new("pt1", vec![7, 7], "ehr:v1"))
                .await
                .unwrap();
            store
                .put_request(&AccessRequest::new("pt1", "dr1"))
                .await
                .unwrap();
            store.flush().unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        let record = store.get_record("pt1").await.unwrap().unwrap();
        assert_eq!(record.ciphertext, vec![7, 7]);
        assert!(store
            .get_request(&PairKey::new("pt1", "dr1"))
            .await
            .unwrap()
            .is_some());
    }
}
