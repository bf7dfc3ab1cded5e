//! In-Memory Ledger
//!
//! Emulates the EHR contract in process so the layers above can be tested
//! without a peer network. Every call is recorded, and failures can be
//! injected per function or globally.
//!
//! `Submit` persists the write; `Evaluate` runs it against a copy and
//! discards the result, as a peer query would.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use ehr_core::types::{EventKind, LedgerAccessRecord, LedgerEvent, LedgerStatus, PairKey};

use crate::client::{InvokeMode, InvokeRequest, LedgerGateway};
use crate::error::{LedgerError, LedgerResult};

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub mode: InvokeMode,
    pub function: String,
    pub args: Vec<String>,
    pub actor_id: String,
    pub org_id: String,
}

/// Mock ledger gateway for testing
pub struct MockLedgerGateway {
    records: RwLock<HashMap<PairKey, LedgerAccessRecord>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<String, LedgerError>>,
    fail_mode: AtomicBool,
}

impl MockLedgerGateway {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            fail_mode: AtomicBool::new(false),
        }
    }

    /// Fail every call with a transport error
    pub fn set_fail_mode(&self, fail: bool) {
        self.fail_mode.store(fail, Ordering::SeqCst);
    }

    /// Fail every call to `function` with `error` until cleared
    pub async fn fail_function(&self, function: &str, error: LedgerError) {
        self.failures.lock().await.insert(function.to_string(), error);
    }

    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    /// Insert a record directly, bypassing the contract
    pub async fn seed_record(&self, record: LedgerAccessRecord) {
        self.records.write().await.insert(record.pair(), record);
    }

    pub async fn record(&self, patient_id: &str, doctor_id: &str) -> Option<LedgerAccessRecord> {
        self.records
            .read()
            .await
            .get(&PairKey::new(patient_id, doctor_id))
            .cloned()
    }

    /// All calls, in order
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Calls made to one function
    pub async fn calls_to(&self, function: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.function == function)
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn execute(&self, request: &InvokeRequest) -> LedgerResult<Vec<u8>> {
        let args = &request.args;
        match request.function.as_str() {
            "createEHRRecord" => {
                let [doctor, patient, hash, ts] = four_args(request)?;
                let key = PairKey::new(patient, doctor);
                let mut records = self.records.write().await;
                if records.contains_key(&key) {
                    return Err(LedgerError::endorsement(format!(
                        "The EHR record for patient {} and doctor {} already exists",
                        patient, doctor
                    )));
                }
                let record = LedgerAccessRecord {
                    patient_id: patient.to_string(),
                    doctor_id: doctor.to_string(),
                    hash: hash.to_string(),
                    status: LedgerStatus::Active,
                    timestamp: ts.to_string(),
                    transactions: vec![event(EventKind::Creation, hash, ts)],
                };
                let out = to_json(&record)?;
                if request.mode == InvokeMode::Submit {
                    records.insert(key, record);
                }
                Ok(out)
            }
            "updateEHRRecord" | "recordAccess" | "revokeAccess" | "activateAccess" => {
                let [doctor, patient, hash, ts] = four_args(request)?;
                let key = PairKey::new(patient, doctor);
                let mut records = self.records.write().await;
                let mut record = records.get(&key).cloned().ok_or_else(|| not_found(&key))?;

                let kind = match request.function.as_str() {
                    "updateEHRRecord" => {
                        record.hash = hash.to_string();
                        EventKind::Update
                    }
                    "recordAccess" => EventKind::Access,
                    "revokeAccess" => {
                        record.status = LedgerStatus::Revoked;
                        EventKind::Revoke
                    }
                    _ => {
                        record.status = LedgerStatus::Active;
                        EventKind::Activate
                    }
                };
                record.timestamp = ts.to_string();
                record.transactions.push(event(kind, hash, ts));

                let out = to_json(&record)?;
                if request.mode == InvokeMode::Submit {
                    records.insert(key, record);
                }
                Ok(out)
            }
            "getEHRRecord" => {
                let (patient, doctor) = two_args(request)?;
                let key = PairKey::new(patient, doctor);
                let records = self.records.read().await;
                let record = records.get(&key).ok_or_else(|| not_found(&key))?;
                to_json(record)
            }
            "getAllEHRRecordByPatient" | "getAllEHRRecordByDoctor" => {
                let id = args
                    .first()
                    .ok_or_else(|| arity_error(&request.function, 1, args.len()))?;
                let by_patient = request.function == "getAllEHRRecordByPatient";
                let records = self.records.read().await;
                let mut matching: Vec<&LedgerAccessRecord> = records
                    .values()
                    .filter(|r| {
                        if by_patient {
                            &r.patient_id == id
                        } else {
                            &r.doctor_id == id
                        }
                    })
                    .collect();
                matching.sort_by(|a, b| a.pair().cmp(&b.pair()));
                to_json(&matching)
            }
            other => Err(LedgerError::endorsement(format!(
                "Function {} not found in contract {}",
                other, request.contract
            ))),
        }
    }
}

impl Default for MockLedgerGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedgerGateway {
    async fn invoke(&self, request: &InvokeRequest) -> LedgerResult<Vec<u8>> {
        self.calls.lock().await.push(RecordedCall {
            mode: request.mode,
            function: request.function.clone(),
            args: request.args.clone(),
            actor_id: request.actor_id.clone(),
            org_id: request.org_id.clone(),
        });

        if self.fail_mode.load(Ordering::SeqCst) {
            return Err(LedgerError::transport("Mock failure mode"));
        }
        if let Some(err) = self.failures.lock().await.get(&request.function) {
            return Err(err.clone());
        }

        self.execute(request).await
    }
}

fn event(kind: EventKind, hash: &str, ts: &str) -> LedgerEvent {
    LedgerEvent {
        kind,
        timestamp: ts.to_string(),
        hash: hash.to_string(),
    }
}

fn not_found(key: &PairKey) -> LedgerError {
    LedgerError::endorsement(format!(
        "The EHR record for patient {} and doctor {} does not exist",
        key.patient_id, key.doctor_id
    ))
}

fn arity_error(function: &str, expected: usize, got: usize) -> LedgerError {
    LedgerError::endorsement(format!(
        "Incorrect number of arguments for {}: expected {}, got {}",
        function, expected, got
    ))
}

fn four_args(request: &InvokeRequest) -> LedgerResult<[&str; 4]> {
    match request.args.as_slice() {
        [a, b, c, d] => Ok([a.as_str(), b.as_str(), c.as_str(), d.as_str()]),
        other => Err(arity_error(&request.function, 4, other.len())),
    }
}

fn two_args(request: &InvokeRequest) -> LedgerResult<(&str, &str)> {
    match request.args.as_slice() {
        [a, b] => Ok((a.as_str(), b.as_str())),
        other => Err(arity_error(&request.function, 2, other.len())),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> LedgerResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| LedgerError::Unknown(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(function: &str, args: &[&str]) -> InvokeRequest {
        InvokeRequest::new(InvokeMode::Submit, "mychannel", "ehr", function)
            .with_args(args.iter().copied())
            .as_actor("pt1", "Org1MSP")
    }

    fn evaluate(function: &str, args: &[&str]) -> InvokeRequest {
        InvokeRequest {
            mode: InvokeMode::Evaluate,
            ..submit(function, args)
        }
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let ledger = MockLedgerGateway::new();
        ledger
            .invoke(&submit("createEHRRecord", &["dr1", "pt1", "h1", "t1"]))
            .await
            .unwrap();

        let raw = ledger
            .invoke(&evaluate("getEHRRecord", &["pt1", "dr1"]))
            .await
            .unwrap();
        let record: LedgerAccessRecord = serde_json::from_slice(&raw).unwrap();
        assert!(record.status.is_active());
        assert_eq!(record.transactions[0].kind, EventKind::Creation);
        assert_eq!(record.hash, "h1");
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let ledger = MockLedgerGateway::new();
        let err = ledger
            .invoke(&evaluate("getEHRRecord", &["pt1", "dr1"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = ledger
            .invoke(&submit("activateAccess", &["dr1", "pt1", "h", "t"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let ledger = MockLedgerGateway::new();
        let req = submit("createEHRRecord", &["dr1", "pt1", "h1", "t1"]);
        ledger.invoke(&req).await.unwrap();
        let err = ledger.invoke(&req).await.unwrap_err();
        assert!(matches!(err, LedgerError::EndorsementFailure { .. }));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_revoke_and_activate_flip_status() {
        let ledger = MockLedgerGateway::new();
        ledger
            .invoke(&submit("createEHRRecord", &["dr1", "pt1", "h1", "t1"]))
            .await
            .unwrap();
        ledger
            .invoke(&submit("revokeAccess", &["dr1", "pt1", "h1", "t2"]))
            .await
            .unwrap();
        assert_eq!(
            ledger.record("pt1", "dr1").await.unwrap().status,
            LedgerStatus::Revoked
        );

        ledger
            .invoke(&submit("activateAccess", &["dr1", "pt1", "h1", "t3"]))
            .await
            .unwrap();
        let record = ledger.record("pt1", "dr1").await.unwrap();
        assert!(record.status.is_active());
        assert_eq!(record.transactions.len(), 3);
    }

    #[tokio::test]
    async fn test_evaluate_does_not_commit() {
        let ledger = MockLedgerGateway::new();
        ledger
            .invoke(&evaluate("createEHRRecord", &["dr1", "pt1", "h1", "t1"]))
            .await
            .unwrap();
        assert!(ledger.record("pt1", "dr1").await.is_none());
    }

    #[tokio::test]
    async fn test_failure_injection_and_call_recording() {
        let ledger = MockLedgerGateway::new();
        ledger
            .fail_function("recordAccess", LedgerError::transport("peer down"))
            .await;
        ledger
            .invoke(&submit("createEHRRecord", &["dr1", "pt1", "h1", "t1"]))
            .await
            .unwrap();
        let err = ledger
            .invoke(&submit("recordAccess", &["dr1", "pt1", "h1", "t2"]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(ledger.record("pt1", "dr1").await.unwrap().transactions.len(), 1);
        assert_eq!(ledger.calls().await.len(), 2);
        assert_eq!(ledger.calls_to("recordAccess").await[0].args[0], "dr1");

        ledger.set_fail_mode(true);
        assert!(ledger
            .invoke(&evaluate("getEHRRecord", &["pt1", "dr1"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_queries_by_patient_and_doctor() {
        let ledger = MockLedgerGateway::new();
        for (d, p) in [("dr1", "pt1"), ("dr2", "pt1"), ("dr1", "pt2")] {
            ledger
                .invoke(&submit("createEHRRecord", &[d, p, "h", "t"]))
                .await
                .unwrap();
        }

        let raw = ledger
            .invoke(&evaluate("getAllEHRRecordByPatient", &["pt1"]))
            .await
            .unwrap();
        let records: Vec<LedgerAccessRecord> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(records.len(), 2);

        let raw = ledger
            .invoke(&evaluate("getAllEHRRecordByDoctor", &["dr1"]))
            .await
            .unwrap();
        let records: Vec<LedgerAccessRecord> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.doctor_id == "dr1"));
    }

    #[tokio::test]
    async fn test_wrong_arity_is_endorsement_failure() {
        let ledger = MockLedgerGateway::new();
        let err = ledger
            .invoke(&submit("recordAccess", &["dr1", "pt1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::EndorsementFailure { .. }));
    }
}
