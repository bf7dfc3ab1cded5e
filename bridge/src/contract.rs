//! EHR Contract Client
//!
//! Typed wrapper over the contract functions. Argument order is positional
//! and fixed by the contract:
//!
//! | Function                   | Mode     | Args                                  |
//! |----------------------------|----------|---------------------------------------|
//! | `getEHRRecord`             | evaluate | patient, doctor                       |
//! | `getAllEHRRecordByPatient` | evaluate | patient                               |
//! | `getAllEHRRecordByDoctor`  | evaluate | doctor                                |
//! | `createEHRRecord`          | submit   | doctor, patient, hash, timestamp      |
//! | `recordAccess`             | submit   | doctor, patient, hash, timestamp      |
//! | `updateEHRRecord`          | submit   | doctor, patient, hash, timestamp      |
//! | `activateAccess`           | submit   | doctor, patient, hash, timestamp      |
//! | `revokeAccess`             | submit   | doctor, patient, hash, timestamp      |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use ehr_core::types::{LedgerAccessRecord, PairKey};
use ehr_core::ContentHash;
use ledger_gateway::{InvokeMode, InvokeRequest, LedgerGateway};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};

/// Contract function names
pub mod functions {
    pub const GET_RECORD: &str = "getEHRRecord";
    pub const RECORDS_BY_PATIENT: &str = "getAllEHRRecordByPatient";
    pub const RECORDS_BY_DOCTOR: &str = "getAllEHRRecordByDoctor";
    pub const CREATE_RECORD: &str = "createEHRRecord";
    pub const RECORD_ACCESS: &str = "recordAccess";
    pub const UPDATE_RECORD: &str = "updateEHRRecord";
    pub const ACTIVATE_ACCESS: &str = "activateAccess";
    pub const REVOKE_ACCESS: &str = "revokeAccess";
}

/// Principal a ledger call is made as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub actor_id: String,
    pub org_id: String,
}

impl Caller {
    pub fn new(actor_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            org_id: org_id.into(),
        }
    }
}

/// Client for the EHR contract on one channel
pub struct EhrContract<G> {
    gateway: G,
    channel: String,
    contract: String,
}

impl<G: LedgerGateway> EhrContract<G> {
    pub fn new(gateway: G, config: &BridgeConfig) -> Self {
        Self {
            gateway,
            channel: config.channel.clone(),
            contract: config.contract.clone(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    async fn call(
        &self,
        mode: InvokeMode,
        caller: &Caller,
        function: &str,
        args: Vec<String>,
    ) -> BridgeResult<Vec<u8>> {
        let request = InvokeRequest::new(mode, &self.channel, &self.contract, function)
            .with_args(args)
            .as_actor(&caller.actor_id, &caller.org_id);

        let started = Instant::now();
        let result = self.gateway.invoke(&request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(payload) => {
                tracing::debug!(
                    function,
                    mode = %mode,
                    actor_id = %caller.actor_id,
                    duration_ms,
                    "Contract call succeeded"
                );
                Ok(payload)
            }
            Err(e) => {
                tracing::debug!(
                    function,
                    mode = %mode,
                    actor_id = %caller.actor_id,
                    error = %e,
                    "Contract call failed"
                );
                Err(e.into())
            }
        }
    }

    fn parse<T: DeserializeOwned>(function: &str, payload: &[u8]) -> BridgeResult<T> {
        serde_json::from_slice(payload).map_err(|e| BridgeError::InvalidLedgerResponse {
            function: function.to_string(),
            reason: e.to_string(),
        })
    }

    async fn submit_event(
        &self,
        caller: &Caller,
        function: &str,
        pair: &PairKey,
        hash: &ContentHash,
        timestamp: &str,
    ) -> BridgeResult<()> {
        self.call(
            InvokeMode::Submit,
            caller,
            function,
            vec![
                pair.doctor_id.clone(),
                pair.patient_id.clone(),
                hash.as_str().to_string(),
                timestamp.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    /// Ledger record for a pair, `None` when the contract reports it does not exist
    pub async fn get_record(
        &self,
        caller: &Caller,
        pair: &PairKey,
    ) -> BridgeResult<Option<LedgerAccessRecord>> {
        let args = vec![pair.patient_id.clone(), pair.doctor_id.clone()];
        match self
            .call(InvokeMode::Evaluate, caller, functions::GET_RECORD, args)
            .await
        {
            Ok(payload) => Self::parse(functions::GET_RECORD, &payload).map(Some),
            Err(BridgeError::Ledger(e)) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn records_by_patient(
        &self,
        caller: &Caller,
        patient_id: &str,
    ) -> BridgeResult<Vec<LedgerAccessRecord>> {
        let payload = self
            .call(
                InvokeMode::Evaluate,
                caller,
                functions::RECORDS_BY_PATIENT,
                vec![patient_id.to_string()],
            )
            .await?;
        Self::parse(functions::RECORDS_BY_PATIENT, &payload)
    }

    pub async fn records_by_doctor(
        &self,
        caller: &Caller,
        doctor_id: &str,
    ) -> BridgeResult<Vec<LedgerAccessRecord>> {
        let payload = self
            .call(
                InvokeMode::Evaluate,
                caller,
                functions::RECORDS_BY_DOCTOR,
                vec![doctor_id.to_string()],
            )
            .await?;
        Self::parse(functions::RECORDS_BY_DOCTOR, &payload)
    }

    pub async fn create_record(
        &self,
        caller: &Caller,
        pair: &PairKey,
        hash: &ContentHash,
        timestamp: &str,
    ) -> BridgeResult<()> {
        self.submit_event(caller, functions::CREATE_RECORD, pair, hash, timestamp)
            .await
    }

    pub async fn record_access(
        &self,
        caller: &Caller,
        pair: &PairKey,
        hash: &ContentHash,
        timestamp: &str,
    ) -> BridgeResult<()> {
        self.submit_event(caller, functions::RECORD_ACCESS, pair, hash, timestamp)
            .await
    }

    pub async fn update_record(
        &self,
        caller: &Caller,
        pair: &PairKey,
        hash: &ContentHash,
        timestamp: &str,
    ) -> BridgeResult<()> {
        self.submit_event(caller, functions::UPDATE_RECORD, pair, hash, timestamp)
            .await
    }

    pub async fn activate_access(
        &self,
        caller: &Caller,
        pair: &PairKey,
        hash: &ContentHash,
        timestamp: &str,
    ) -> BridgeResult<()> {
        self.submit_event(caller, functions::ACTIVATE_ACCESS, pair, hash, timestamp)
            .await
    }

    pub async fn revoke_access(
        &self,
        caller: &Caller,
        pair: &PairKey,
        hash: &ContentHash,
        timestamp: &str,
    ) -> BridgeResult<()> {
        self.submit_event(caller, functions::REVOKE_ACCESS, pair, hash, timestamp)
            .await
    }
}
