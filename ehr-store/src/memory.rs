//! In-Memory Stores
//!
//! Used by tests and by the CLI when no store path is configured.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use ehr_core::types::{AccessRequest, AccessStatus, EncryptedRecord, PairKey};

use crate::error::StoreResult;
use crate::{RecordStore, StatusMirror};

/// Thread-safe in-memory implementation of both stores
#[derive(Debug, Default)]
pub struct MemoryStore {
    requests: Arc<RwLock<HashMap<PairKey, AccessRequest>>>,
    records: Arc<RwLock<HashMap<String, EncryptedRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    async fn filter_requests<F>(&self, pred: F) -> Vec<AccessRequest>
    where
        F: Fn(&AccessRequest) -> bool,
    {
        let mut out: Vec<AccessRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| pred(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.pair().cmp(&b.pair()));
        out
    }
}

#[async_trait]
impl StatusMirror for MemoryStore {
    async fn get_request(&self, pair: &PairKey) -> StoreResult<Option<AccessRequest>> {
        Ok(self.requests.read().await.get(pair).cloned())
    }

    async fn put_request(&self, request: &AccessRequest) -> StoreResult<()> {
        self.requests
            .write()
            .await
            .insert(request.pair(), request.clone());
        Ok(())
    }

    async fn requests_by_patient(&self, patient_id: &str) -> StoreResult<Vec<AccessRequest>> {
        Ok(self.filter_requests(|r| r.patient_id == patient_id).await)
    }

    async fn requests_by_doctor(&self, doctor_id: &str) -> StoreResult<Vec<AccessRequest>> {
        Ok(self.filter_requests(|r| r.doctor_id == doctor_id).await)
    }

    async fn requests_by_status(&self, status: AccessStatus) -> StoreResult<Vec<AccessRequest>> {
        Ok(self.filter_requests(|r| r.status == status).await)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_record(&self, patient_id: &str) -> StoreResult<Option<EncryptedRecord>> {
        Ok(self.records.read().await.get(patient_id).cloned())
    }

    async fn put_record(&self, record: &EncryptedRecord) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(record.patient_id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_request_per_pair() {
        let store = MemoryStore::new();
        let mut req = AccessRequest::new("pt1", "dr1");
        store.put_request(&req).await.unwrap();

        req.set_status(AccessStatus::Accepted);
        store.put_request(&req).await.unwrap();

        assert_eq!(store.request_count().await, 1);
        let stored = store
            .get_request(&PairKey::new("pt1", "dr1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, AccessStatus::Accepted);
        assert_eq!(stored.request_id, req.request_id);
    }

    #[tokio::test]
    async fn test_lookups_by_patient_doctor_status() {
        let store = MemoryStore::new();
        let mut accepted = AccessRequest::new("pt1", "dr2");
        accepted.set_status(AccessStatus::Accepted);
        for req in [
            AccessRequest::new("pt1", "dr1"),
            accepted,
            AccessRequest::new("pt2", "dr1"),
        ] {
            store.put_request(&req).await.unwrap();
        }

        assert_eq!(store.requests_by_patient("pt1").await.unwrap().len(), 2);
        let by_doctor = store.requests_by_doctor("dr1").await.unwrap();
        assert_eq!(by_doctor.len(), 2);
        assert_eq!(by_doctor[0].patient_id, "pt1");
        assert_eq!(
            store
                .requests_by_status(AccessStatus::Requested)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_record_replace() {
        let store = MemoryStore::new();
        store
            .put_record(&EncryptedRecord::new("pt1", vec![1], "ehr:v1"))
            .await
            .unwrap();
        store
            .put_record(&EncryptedRecord::new("pt1", vec![2], "ehr:v1"))
            .await
            .unwrap();
        assert_eq!(
            store.get_record("pt1").await.unwrap().unwrap().ciphertext,
            vec![2]
        );
        assert!(store.get_record("pt9").await.unwrap().is_none());
    }
}
