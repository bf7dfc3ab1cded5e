//! Reconciler
//!
//! Gates document reads and writes on the ledger and keeps the local stores
//! consistent with what the ledger attests to.
//!
//! - A doctor sees a document only after the ledger reports the pair
//!   `active` and an access event has been committed.
//! - New ciphertext is written only after the ledger committed the update
//!   event carrying its hash.
//! - The mirror is a cache: [`Reconciler::reconcile_mirror`] rewrites it from
//!   ledger truth.

use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;

use ehr_core::logging::{operations, LogContext};
use ehr_core::types::{
    ledger_timestamp, AccessRequest, AccessStatus, EhrDocument, HistoryEntry, LedgerAccessRecord,
    LedgerEvent, LedgerStatus, PairKey,
};
use ehr_core::ContentHash;
use ehr_store::StatusMirror;
use ledger_gateway::LedgerGateway;

use crate::contract::Caller;
use crate::error::{BridgeError, BridgeResult};
use crate::service::Shared;

pub struct Reconciler<G> {
    shared: Arc<Shared<G>>,
}

fn op_span(caller: &Caller, operation: &'static str) -> tracing::Span {
    LogContext::new()
        .with_actor(caller.actor_id.as_str(), caller.org_id.as_str())
        .with_operation(operation)
        .span()
}

impl<G: LedgerGateway> Reconciler<G> {
    pub(crate) fn new(shared: Arc<Shared<G>>) -> Self {
        Self { shared }
    }

    /// Ledger record for the pair, provided it is active
    async fn require_active(
        &self,
        caller: &Caller,
        pair: &PairKey,
    ) -> BridgeResult<LedgerAccessRecord> {
        match self.shared.contract.get_record(caller, pair).await? {
            Some(record) if record.status.is_active() => Ok(record),
            Some(record) => Err(BridgeError::access_denied(
                &pair.patient_id,
                &pair.doctor_id,
                record.status,
            )),
            None => Err(BridgeError::access_denied(
                &pair.patient_id,
                &pair.doctor_id,
                "absent",
            )),
        }
    }

    /// Verify the pair is active on the ledger, then commit an access event
    /// carrying the hash of the patient's current content
    pub async fn try_record_access(&self, doctor: &Caller, patient_id: &str) -> BridgeResult<()> {
        let pair = PairKey::new(patient_id, doctor.actor_id.as_str());
        async {
            self.require_active(doctor, &pair).await?;
            let hash = self.shared.vault.content_hash(patient_id).await?;
            self.shared
                .contract
                .record_access(doctor, &pair, &hash, &ledger_timestamp(Utc::now()))
                .await?;
            tracing::info!(patient_id, doctor_id = %doctor.actor_id, "Access recorded on ledger");
            Ok::<_, BridgeError>(())
        }
        .instrument(op_span(doctor, operations::RECORD_ACCESS))
        .await
    }

    /// Boolean form of [`Self::try_record_access`]; every failure denies
    pub async fn verify_and_record_access(
        &self,
        doctor_id: &str,
        patient_id: &str,
        org_id: &str,
    ) -> bool {
        match self
            .try_record_access(&Caller::new(doctor_id, org_id), patient_id)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(patient_id, doctor_id, kind = e.kind(), error = %e, "Access denied");
                false
            }
        }
    }

    /// Verify the pair is active on the ledger, then commit an update event
    /// carrying `new_hash`
    pub async fn try_record_update(
        &self,
        doctor: &Caller,
        patient_id: &str,
        new_hash: &ContentHash,
    ) -> BridgeResult<()> {
        let pair = PairKey::new(patient_id, doctor.actor_id.as_str());
        async {
            self.require_active(doctor, &pair).await?;
            self.shared
                .contract
                .update_record(doctor, &pair, new_hash, &ledger_timestamp(Utc::now()))
                .await?;
            tracing::info!(
                patient_id,
                doctor_id = %doctor.actor_id,
                hash = %new_hash,
                "Update recorded on ledger"
            );
            Ok::<_, BridgeError>(())
        }
        .instrument(op_span(doctor, operations::RECORD_UPDATE))
        .await
    }

    /// Boolean form of [`Self::try_record_update`]; every failure denies
    pub async fn verify_and_record_update(
        &self,
        doctor_id: &str,
        patient_id: &str,
        org_id: &str,
        new_hash: &ContentHash,
    ) -> bool {
        match self
            .try_record_update(&Caller::new(doctor_id, org_id), patient_id, new_hash)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(patient_id, doctor_id, kind = e.kind(), error = %e, "Update denied");
                false
            }
        }
    }

    /// Ledger-gated read of a patient's document by a doctor
    pub async fn view_document(&self, doctor: &Caller, patient_id: &str) -> BridgeResult<EhrDocument> {
        async {
            let _guard = self.shared.documents.acquire(&patient_id.to_string()).await;
            let doc = self.shared.vault.load_required(patient_id).await?;
            self.try_record_access(doctor, patient_id).await?;
            if self.shared.config.enforce_integrity {
                self.check_integrity(doctor, patient_id, &doc).await?;
            }
            Ok::<_, BridgeError>(doc)
        }
        .instrument(op_span(doctor, operations::DOCUMENT_VIEW))
        .await
    }

    /// Ledger-gated write of a patient's document by a doctor
    ///
    /// The ciphertext is replaced only after the update event committed. The
    /// patient's document lock is held across both, so the stored content
    /// always matches the newest committed update.
    pub async fn update_document(
        &self,
        doctor: &Caller,
        patient_id: &str,
        doc: &EhrDocument,
    ) -> BridgeResult<ContentHash> {
        let sealed = self.shared.vault.seal(patient_id, doc)?;
        let _guard = self.shared.documents.acquire(&patient_id.to_string()).await;
        self.try_record_update(doctor, patient_id, &sealed.hash).await?;

        if let Err(e) = self.shared.vault.store(&sealed).await {
            tracing::error!(
                patient_id,
                doctor_id = %doctor.actor_id,
                hash = %sealed.hash,
                error = %e,
                "Ledger update committed but local record write failed"
            );
            return Err(e);
        }
        Ok(sealed.hash)
    }

    /// Compare the stored document with the latest hash the ledger attests to
    pub async fn verify_integrity(&self, caller: &Caller, patient_id: &str) -> BridgeResult<ContentHash> {
        async {
            let _guard = self.shared.documents.acquire(&patient_id.to_string()).await;
            let doc = self.shared.vault.load_required(patient_id).await?;
            self.check_integrity(caller, patient_id, &doc).await
        }
        .instrument(op_span(caller, operations::INTEGRITY_CHECK))
        .await
    }

    async fn check_integrity(
        &self,
        caller: &Caller,
        patient_id: &str,
        doc: &EhrDocument,
    ) -> BridgeResult<ContentHash> {
        let records = self.shared.contract.records_by_patient(caller, patient_id).await?;
        let actual = self.shared.vault.codec().hash(doc)?;

        // Newest content event per record, then the newest timestamp across
        // records. Events on different records sharing that timestamp have no
        // defined order, so any of them may be the current content.
        let latest: Vec<&LedgerEvent> =
            records.iter().filter_map(|r| r.latest_content_event()).collect();
        let Some(newest) = latest.iter().map(|e| e.timestamp.as_str()).max() else {
            tracing::debug!(patient_id, "No content attested on ledger yet");
            return Ok(actual);
        };
        let mut attested: Vec<ContentHash> = latest
            .iter()
            .filter(|e| e.timestamp == newest)
            .map(|e| ContentHash::from_ledger(e.hash.as_str()))
            .collect();

        if !attested.contains(&actual) {
            let expected = attested.pop().map(ContentHash::into_string).unwrap_or_default();
            tracing::error!(
                patient_id,
                expected = %expected,
                actual = %actual,
                "Local record does not match ledger"
            );
            return Err(BridgeError::IntegrityMismatch {
                patient_id: patient_id.to_string(),
                expected,
                actual: actual.into_string(),
            });
        }
        Ok(actual)
    }

    /// Rewrite the mirror entry for a pair from the ledger record.
    ///
    /// Returns the new status when the entry changed. Pairs the ledger has no
    /// record of are left as they are.
    pub async fn reconcile_mirror(
        &self,
        caller: &Caller,
        pair: &PairKey,
    ) -> BridgeResult<Option<AccessStatus>> {
        async {
            let _guard = self.shared.locks.acquire(pair).await;

            let Some(record) = self.shared.contract.get_record(caller, pair).await? else {
                return Ok(None);
            };
            let Some(ledger_status) = record.status.mirror_status() else {
                tracing::warn!(pair = %pair, ledger_status = %record.status, "Unrecognised ledger status");
                return Ok(None);
            };

            let current = self.shared.mirror.get_request(pair).await?;
            if current.as_ref().map(|r| r.status) == Some(ledger_status) {
                return Ok(None);
            }

            let mut request = current.unwrap_or_else(|| {
                AccessRequest::new(pair.patient_id.clone(), pair.doctor_id.clone())
            });
            let previous = request.status;
            request.set_status(ledger_status);
            self.shared.mirror.put_request(&request).await?;

            tracing::info!(
                pair = %pair,
                from = %previous,
                status = %ledger_status,
                "Mirror reconciled from ledger"
            );
            Ok::<_, BridgeError>(Some(ledger_status))
        }
        .instrument(op_span(caller, operations::RECONCILE))
        .await
    }

    /// Open requests awaiting the patient's answer (local mirror)
    pub async fn pending_requests(&self, patient_id: &str) -> BridgeResult<Vec<AccessRequest>> {
        Ok(self
            .shared
            .mirror
            .requests_by_patient(patient_id)
            .await?
            .into_iter()
            .filter(|r| r.status == AccessStatus::Requested)
            .collect())
    }

    async fn doctors_with_status(
        &self,
        caller: &Caller,
        patient_id: &str,
        status: LedgerStatus,
    ) -> BridgeResult<Vec<String>> {
        Ok(self
            .shared
            .contract
            .records_by_patient(caller, patient_id)
            .await?
            .into_iter()
            .filter(|r| r.status == status)
            .map(|r| r.doctor_id)
            .collect())
    }

    /// Doctors the ledger currently lets read the patient's record
    pub async fn active_doctors(&self, caller: &Caller, patient_id: &str) -> BridgeResult<Vec<String>> {
        self.doctors_with_status(caller, patient_id, LedgerStatus::Active)
            .await
    }

    pub async fn revoked_doctors(&self, caller: &Caller, patient_id: &str) -> BridgeResult<Vec<String>> {
        self.doctors_with_status(caller, patient_id, LedgerStatus::Revoked)
            .await
    }

    /// Patients whose records the calling doctor may currently read
    pub async fn doctor_patients(&self, doctor: &Caller) -> BridgeResult<Vec<String>> {
        Ok(self
            .shared
            .contract
            .records_by_doctor(doctor, &doctor.actor_id)
            .await?
            .into_iter()
            .filter(|r| r.status.is_active())
            .map(|r| r.patient_id)
            .collect())
    }

    /// Event history of one pair, in ledger order. Empty when the ledger
    /// holds no record for the pair.
    pub async fn history(&self, caller: &Caller, pair: &PairKey) -> BridgeResult<Vec<LedgerEvent>> {
        Ok(self
            .shared
            .contract
            .get_record(caller, pair)
            .await?
            .map(|record| record.transactions)
            .unwrap_or_default())
    }

    /// Every event across the patient's records, newest first
    pub async fn full_history(&self, caller: &Caller, patient_id: &str) -> BridgeResult<Vec<HistoryEntry>> {
        let records = self.shared.contract.records_by_patient(caller, patient_id).await?;
        let mut entries: Vec<HistoryEntry> = records
            .into_iter()
            .flat_map(|record| {
                let doctor_id = record.doctor_id;
                record.transactions.into_iter().map(move |event| HistoryEntry {
                    doctor_id: doctor_id.clone(),
                    event,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
        tracing::debug!(patient_id, count = entries.len(), "Full history assembled");
        Ok(entries)
    }

    /// Store a patient's first document.
    ///
    /// Allowed only while the ledger attests no content for the patient; the
    /// document is then attested by the first create. Once a ledger record
    /// exists, content changes go through [`Self::update_document`].
    pub async fn add_document(&self, patient: &Caller, doc: &EhrDocument) -> BridgeResult<ContentHash> {
        let patient_id = patient.actor_id.as_str();
        let sealed = self.shared.vault.seal(patient_id, doc)?;
        let _guard = self.shared.documents.acquire(&patient_id.to_string()).await;

        if self.shared.vault.load(patient_id).await?.is_some() {
            return Err(BridgeError::document_conflict(
                patient_id,
                "a document is already stored; use update_document",
            ));
        }
        let attested = self
            .shared
            .contract
            .records_by_patient(patient, patient_id)
            .await?
            .iter()
            .any(|r| r.latest_content_event().is_some());
        if attested {
            tracing::warn!(patient_id, "Ledger already attests content, document not stored");
            return Err(BridgeError::document_conflict(
                patient_id,
                "the ledger already attests content; use update_document",
            ));
        }

        self.shared.vault.store(&sealed).await?;
        tracing::info!(patient_id, hash = %sealed.hash, "Document stored");
        Ok(sealed.hash)
    }

    /// The patient's own document
    pub async fn patient_document(&self, patient_id: &str) -> BridgeResult<EhrDocument> {
        self.shared.vault.load_required(patient_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::contract::functions;
    use crate::service::EhrBridge;
    use ehr_core::types::{EncryptedRecord, EventKind};
    use ehr_core::{KeyMaterial, RecordCodec};
    use ehr_store::{MemoryStore, RecordStore, Stores};
    use ledger_gateway::MockLedgerGateway;

    struct Fixture {
        bridge: EhrBridge<Arc<MockLedgerGateway>>,
        records: Arc<MemoryStore>,
    }

    fn codec() -> RecordCodec {
        RecordCodec::with_key_material("ehr:test", KeyMaterial::new(vec![5; 32])).unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores {
            mirror: store.clone(),
            records: store.clone(),
        };
        Fixture {
            bridge: EhrBridge::new(
                Arc::new(MockLedgerGateway::new()),
                stores,
                codec(),
                BridgeConfig::default(),
            ),
            records: store,
        }
    }

    fn doctor() -> Caller {
        Caller::new("dr1", "Org1MSP")
    }

    fn patient() -> Caller {
        Caller::new("pt1", "Org1MSP")
    }

    fn doc(diagnosis: &str) -> EhrDocument {
        EhrDocument {
            diagnosis: diagnosis.to_string(),
            ..EhrDocument::empty()
        }
    }

    async fn granted(f: &Fixture) {
        f.bridge.reconciler().add_document(&patient(), &doc("asthma")).await.unwrap();
        f.bridge.access().request(&doctor(), "pt1").await.unwrap();
        f.bridge.access().accept(&patient(), "dr1").await.unwrap();
    }

    #[tokio::test]
    async fn test_access_denied_without_ledger_record() {
        let f = fixture();
        let rec = f.bridge.reconciler();
        assert!(!rec.verify_and_record_access("dr1", "pt1", "Org1MSP").await);

        let err = rec.try_record_access(&doctor(), "pt1").await.unwrap_err();
        assert!(err.is_denial());
        assert!(f.bridge.gateway().calls_to(functions::RECORD_ACCESS).await.is_empty());
    }

    #[tokio::test]
    async fn test_access_recorded_with_current_hash() {
        let f = fixture();
        granted(&f).await;

        assert!(f
            .bridge
            .reconciler()
            .verify_and_record_access("dr1", "pt1", "Org1MSP")
            .await);
        let calls = f.bridge.gateway().calls_to(functions::RECORD_ACCESS).await;
        assert_eq!(calls.len(), 1);
        let expected = codec().hash(&doc("asthma")).unwrap();
        assert_eq!(calls[0].args[2], expected.as_str());
    }

    #[tokio::test]
    async fn test_read_failure_denies_and_is_distinguishable() {
        let f = fixture();
        granted(&f).await;
        f.bridge.gateway().set_fail_mode(true);

        let rec = f.bridge.reconciler();
        assert!(!rec.verify_and_record_access("dr1", "pt1", "Org1MSP").await);
        let err = rec.try_record_access(&doctor(), "pt1").await.unwrap_err();
        assert!(!err.is_denial());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_update_replaces_ciphertext_only_after_commit() {
        let f = fixture();
        granted(&f).await;
        let rec = f.bridge.reconciler();

        let hash = rec.update_document(&doctor(), "pt1", &doc("bronchitis")).await.unwrap();
        assert_eq!(rec.patient_document("pt1").await.unwrap(), doc("bronchitis"));
        assert_eq!(
            f.bridge.gateway().record("pt1", "dr1").await.unwrap().hash,
            hash.as_str()
        );
        assert_eq!(rec.verify_integrity(&patient(), "pt1").await.unwrap(), hash);

        f.bridge.access().revoke(&patient(), "dr1").await.unwrap();
        let err = rec
            .update_document(&doctor(), "pt1", &doc("pneumonia"))
            .await
            .unwrap_err();
        assert!(err.is_denial());
        assert_eq!(rec.patient_document("pt1").await.unwrap(), doc("bronchitis"));
    }

    #[tokio::test]
    async fn test_tampered_record_fails_integrity() {
        let f = fixture();
        granted(&f).await;

        let forged = codec().encrypt_document(&doc("nothing")).unwrap();
        f.records
            .put_record(&EncryptedRecord::new("pt1", forged, "ehr:test"))
            .await
            .unwrap();

        let err = f
            .bridge
            .reconciler()
            .view_document(&doctor(), "pt1")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::IntegrityMismatch { .. }));
        assert!(err.is_invariant_violation());
    }

    #[tokio::test]
    async fn test_reconcile_mirror_follows_ledger() {
        let f = fixture();
        granted(&f).await;
        let pair = PairKey::new("pt1", "dr1");

        // Ledger revoked behind the mirror's back
        f.bridge
            .gateway()
            .seed_record(LedgerAccessRecord {
                status: LedgerStatus::Revoked,
                ..f.bridge.gateway().record("pt1", "dr1").await.unwrap()
            })
            .await;

        let rec = f.bridge.reconciler();
        assert_eq!(
            rec.reconcile_mirror(&patient(), &pair).await.unwrap(),
            Some(AccessStatus::Revoked)
        );
        assert_eq!(rec.reconcile_mirror(&patient(), &pair).await.unwrap(), None);

        let untouched = PairKey::new("pt1", "dr2");
        f.bridge.access().request(&Caller::new("dr2", "Org1MSP"), "pt1").await.unwrap();
        assert_eq!(rec.reconcile_mirror(&patient(), &untouched).await.unwrap(), None);
        assert_eq!(
            f.bridge.mirror().get_request(&untouched).await.unwrap().unwrap().status,
            AccessStatus::Requested
        );
    }

    #[tokio::test]
    async fn test_queries() {
        let f = fixture();
        granted(&f).await;
        let dr2 = Caller::new("dr2", "Org1MSP");
        f.bridge.access().request(&dr2, "pt1").await.unwrap();
        f.bridge.access().accept(&patient(), "dr2").await.unwrap();
        f.bridge.access().revoke(&patient(), "dr2").await.unwrap();
        f.bridge.access().request(&Caller::new("dr3", "Org1MSP"), "pt1").await.unwrap();

        let rec = f.bridge.reconciler();
        let pending = rec.pending_requests("pt1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].doctor_id, "dr3");

        assert_eq!(rec.active_doctors(&patient(), "pt1").await.unwrap(), vec!["dr1"]);
        assert_eq!(rec.revoked_doctors(&patient(), "pt1").await.unwrap(), vec!["dr2"]);
        assert_eq!(rec.doctor_patients(&doctor()).await.unwrap(), vec!["pt1"]);
        assert!(rec.doctor_patients(&dr2).await.unwrap().is_empty());

        let history = rec.history(&patient(), &PairKey::new("pt1", "dr2")).await.unwrap();
        let kinds: Vec<EventKind> = history.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Creation, EventKind::Revoke]);

        let full = rec.full_history(&patient(), "pt1").await.unwrap();
        assert_eq!(full.len(), 3);
        assert!(full
            .windows(2)
            .all(|w| w[0].event.timestamp >= w[1].event.timestamp));
    }

    #[tokio::test]
    async fn test_document_added_before_grant_is_attested() {
        let f = fixture();
        granted(&f).await;

        let rec = f.bridge.reconciler();
        assert_eq!(rec.view_document(&doctor(), "pt1").await.unwrap(), doc("asthma"));

        let err = rec.add_document(&patient(), &doc("eczema")).await.unwrap_err();
        assert!(matches!(err, BridgeError::StateConflict { .. }));
        assert_eq!(rec.patient_document("pt1").await.unwrap(), doc("asthma"));
        assert_eq!(rec.view_document(&doctor(), "pt1").await.unwrap(), doc("asthma"));
    }

    #[tokio::test]
    async fn test_document_added_after_grant_is_refused() {
        let f = fixture();
        f.bridge.access().request(&doctor(), "pt1").await.unwrap();
        f.bridge.access().accept(&patient(), "dr1").await.unwrap();

        let rec = f.bridge.reconciler();
        let err = rec.add_document(&patient(), &doc("asthma")).await.unwrap_err();
        assert!(matches!(err, BridgeError::StateConflict { .. }));
        assert!(matches!(
            rec.patient_document("pt1").await.unwrap_err(),
            BridgeError::RecordNotFound(_)
        ));

        // Content after a grant is attested through an update
        let hash = rec.update_document(&doctor(), "pt1", &doc("asthma")).await.unwrap();
        assert_eq!(rec.view_document(&doctor(), "pt1").await.unwrap(), doc("asthma"));
        assert_eq!(rec.verify_integrity(&patient(), "pt1").await.unwrap(), hash);
    }

    #[tokio::test]
    async fn test_add_document_fails_closed_on_ledger_error() {
        let f = fixture();
        f.bridge.gateway().set_fail_mode(true);
        let err = f
            .bridge
            .reconciler()
            .add_document(&patient(), &doc("asthma"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(f.records.get_record("pt1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_view_without_document_records_no_access() {
        let f = fixture();
        f.bridge.access().request(&doctor(), "pt1").await.unwrap();
        f.bridge.access().accept(&patient(), "dr1").await.unwrap();

        let err = f
            .bridge
            .reconciler()
            .view_document(&doctor(), "pt1")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::RecordNotFound(_)));
        assert!(f.bridge.gateway().calls_to(functions::RECORD_ACCESS).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_keep_store_and_ledger_aligned() {
        let f = fixture();
        granted(&f).await;
        f.bridge.access().request(&Caller::new("dr2", "Org1MSP"), "pt1").await.unwrap();
        f.bridge.access().accept(&patient(), "dr2").await.unwrap();
        let bridge = Arc::new(f.bridge);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let bridge = Arc::clone(&bridge);
            let doctor = Caller::new(if i % 2 == 0 { "dr1" } else { "dr2" }, "Org1MSP");
            tasks.push(tokio::spawn(async move {
                bridge
                    .reconciler()
                    .update_document(&doctor, "pt1", &doc(&format!("visit {}", i)))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let rec = bridge.reconciler();
        let stored = rec.patient_document("pt1").await.unwrap();
        assert_eq!(
            rec.verify_integrity(&patient(), "pt1").await.unwrap(),
            codec().hash(&stored).unwrap()
        );
        assert!(rec.view_document(&doctor(), "pt1").await.is_ok());
    }

    #[tokio::test]
    async fn test_history_of_unknown_pair_is_empty() {
        let f = fixture();
        let history = f
            .bridge
            .reconciler()
            .history(&patient(), &PairKey::new("pt1", "dr9"))
            .await
            .unwrap();
        assert!(history.is_empty());
    }
}
