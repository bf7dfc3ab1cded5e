//! EHR Local Stores
//!
//! Two keyed stores sit beside the ledger:
//!
//! - [`StatusMirror`]: (patientId, doctorId) → [`AccessRequest`], with lookups
//!   by patient, by doctor and by status. A cache of ledger truth, never
//!   authoritative.
//! - [`RecordStore`]: patientId → [`EncryptedRecord`]. Writes replace the
//!   whole record atomically.
//!
//! Neither store supports deletion: revocation is a status value, and a
//! record is only ever superseded.

pub mod config;
pub mod error;
pub mod memory;
pub mod sled;

use async_trait::async_trait;
use std::sync::Arc;

use ehr_core::types::{AccessRequest, AccessStatus, EncryptedRecord, PairKey};

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use self::sled::SledStore;

/// Local mirror of access request status
#[async_trait]
pub trait StatusMirror: Send + Sync {
    async fn get_request(&self, pair: &PairKey) -> StoreResult<Option<AccessRequest>>;

    /// Insert or overwrite the request for its pair
    async fn put_request(&self, request: &AccessRequest) -> StoreResult<()>;

    async fn requests_by_patient(&self, patient_id: &str) -> StoreResult<Vec<AccessRequest>>;

    async fn requests_by_doctor(&self, doctor_id: &str) -> StoreResult<Vec<AccessRequest>>;

    async fn requests_by_status(&self, status: AccessStatus) -> StoreResult<Vec<AccessRequest>>;
}

/// Encrypted EHR payloads keyed by patient
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_record(&self, patient_id: &str) -> StoreResult<Option<EncryptedRecord>>;

    /// Replace the patient's record in a single write
    async fn put_record(&self, record: &EncryptedRecord) -> StoreResult<()>;
}

#[async_trait]
impl<T: StatusMirror + ?Sized> StatusMirror for Arc<T> {
    async fn get_request(&self, pair: &PairKey) -> StoreResult<Option<AccessRequest>> {
        (**self).get_request(pair).await
    }

    async fn put_request(&self, request: &AccessRequest) -> StoreResult<()> {
        (**self).put_request(request).await
    }

    async fn requests_by_patient(&self, patient_id: &str) -> StoreResult<Vec<AccessRequest>> {
        (**self).requests_by_patient(patient_id).await
    }

    async fn requests_by_doctor(&self, doctor_id: &str) -> StoreResult<Vec<AccessRequest>> {
        (**self).requests_by_doctor(doctor_id).await
    }

    async fn requests_by_status(&self, status: AccessStatus) -> StoreResult<Vec<AccessRequest>> {
        (**self).requests_by_status(status).await
    }
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn get_record(&self, patient_id: &str) -> StoreResult<Option<EncryptedRecord>> {
        (**self).get_record(patient_id).await
    }

    async fn put_record(&self, record: &EncryptedRecord) -> StoreResult<()> {
        (**self).put_record(record).await
    }
}

/// Shared handles to both stores
pub struct Stores {
    pub mirror: Arc<dyn StatusMirror>,
    pub records: Arc<dyn RecordStore>,
}

/// Open the stores selected by `config`
pub fn open_stores(config: &StoreConfig) -> StoreResult<Stores> {
    match &config.path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Opening sled stores");
            let store = Arc::new(SledStore::open(path)?);
            Ok(Stores {
                mirror: store.clone(),
                records: store,
            })
        }
        None => {
            tracing::info!("Using in-memory stores");
            let store = Arc::new(MemoryStore::new());
            Ok(Stores {
                mirror: store.clone(),
                records: store,
            })
        }
    }
}
