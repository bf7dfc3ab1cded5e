//! Access State Machine
//!
//! Drives the per-pair consent status. The transition table lives in
//! [`ehr_core::types::plan_transition`]; this module runs the ledger gate a
//! transition requires and writes the mirror only once that gate succeeded.
//!
//! # Ordering
//!
//! ```text
//! acquire pair lock
//!   ├─ read mirror, plan transition        (StateConflict on illegal move)
//!   ├─ run ledger gate                     (any failure: mirror untouched)
//!   └─ write mirror
//! release pair lock
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;

use ehr_core::logging::{operations, LogContext};
use ehr_core::types::{
    ledger_timestamp, plan_transition, AccessAction, AccessRequest, LedgerGate, PairKey,
};
use ehr_store::StatusMirror;
use ledger_gateway::LedgerGateway;

use crate::contract::Caller;
use crate::error::{BridgeError, BridgeResult};
use crate::service::Shared;

pub struct AccessStateMachine<G> {
    shared: Arc<Shared<G>>,
}

impl<G: LedgerGateway> AccessStateMachine<G> {
    pub(crate) fn new(shared: Arc<Shared<G>>) -> Self {
        Self { shared }
    }

    /// Doctor asks for access to a patient's record. Local only.
    pub async fn request(&self, doctor: &Caller, patient_id: &str) -> BridgeResult<AccessRequest> {
        let pair = PairKey::new(patient_id, doctor.actor_id.as_str());
        self.apply(doctor, pair, AccessAction::Request).await
    }

    /// Patient grants a pending request
    pub async fn accept(&self, patient: &Caller, doctor_id: &str) -> BridgeResult<AccessRequest> {
        let pair = PairKey::new(patient.actor_id.as_str(), doctor_id);
        self.apply(patient, pair, AccessAction::Accept).await
    }

    pub async fn revoke(&self, patient: &Caller, doctor_id: &str) -> BridgeResult<AccessRequest> {
        let pair = PairKey::new(patient.actor_id.as_str(), doctor_id);
        self.apply(patient, pair, AccessAction::Revoke).await
    }

    /// Re-grant after a revocation
    pub async fn activate(&self, patient: &Caller, doctor_id: &str) -> BridgeResult<AccessRequest> {
        let pair = PairKey::new(patient.actor_id.as_str(), doctor_id);
        self.apply(patient, pair, AccessAction::Activate).await
    }

    pub async fn reject(&self, patient: &Caller, doctor_id: &str) -> BridgeResult<AccessRequest> {
        let pair = PairKey::new(patient.actor_id.as_str(), doctor_id);
        self.apply(patient, pair, AccessAction::Reject).await
    }

    /// Run `action` against `pair` as `caller`
    pub async fn apply(
        &self,
        caller: &Caller,
        pair: PairKey,
        action: AccessAction,
    ) -> BridgeResult<AccessRequest> {
        let span = LogContext::new()
            .with_actor(caller.actor_id.as_str(), caller.org_id.as_str())
            .with_operation(operations::STATUS_UPDATE)
            .span();
        self.apply_locked(caller, pair, action).instrument(span).await
    }

    async fn apply_locked(
        &self,
        caller: &Caller,
        pair: PairKey,
        action: AccessAction,
    ) -> BridgeResult<AccessRequest> {
        let _guard = self.shared.locks.acquire(&pair).await;

        let current = self.shared.mirror.get_request(&pair).await?;
        let transition = plan_transition(&pair, current.as_ref().map(|r| r.status), action)
            .map_err(|e| {
                tracing::warn!(
                    patient_id = %pair.patient_id,
                    doctor_id = %pair.doctor_id,
                    action = %action,
                    error = %e,
                    "Transition rejected"
                );
                BridgeError::conflict(&pair, e)
            })?;

        if let Err(e) = self.run_gate(caller, &pair, transition.gate).await {
            tracing::warn!(
                patient_id = %pair.patient_id,
                doctor_id = %pair.doctor_id,
                action = %action,
                kind = e.kind(),
                error = %e,
                "Ledger gate failed, status unchanged"
            );
            return Err(e);
        }

        let mut request = current.unwrap_or_else(|| {
            AccessRequest::new(pair.patient_id.clone(), pair.doctor_id.clone())
        });
        request.set_status(transition.to);

        if let Err(e) = self.shared.mirror.put_request(&request).await {
            if !transition.gate.is_local() {
                tracing::error!(
                    patient_id = %pair.patient_id,
                    doctor_id = %pair.doctor_id,
                    action = %action,
                    error = %e,
                    "Ledger committed but mirror write failed; reconcile the pair"
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            patient_id = %pair.patient_id,
            doctor_id = %pair.doctor_id,
            action = %action,
            from = ?transition.from,
            status = %transition.to,
            "Access status updated"
        );
        Ok(request)
    }

    async fn run_gate(&self, caller: &Caller, pair: &PairKey, gate: LedgerGate) -> BridgeResult<()> {
        if gate.is_local() {
            return Ok(());
        }

        let contract = &self.shared.contract;
        let hash = self.shared.vault.content_hash(&pair.patient_id).await?;
        let timestamp = ledger_timestamp(Utc::now());

        match gate {
            LedgerGate::None => Ok(()),
            LedgerGate::CreateOrActivate => match contract.get_record(caller, pair).await? {
                None => {
                    tracing::debug!(
                        operation = operations::LEDGER_CREATE,
                        pair = %pair,
                        "No ledger record, creating"
                    );
                    contract.create_record(caller, pair, &hash, &timestamp).await
                }
                Some(record) => {
                    tracing::debug!(
                        operation = operations::LEDGER_ACTIVATE,
                        pair = %pair,
                        ledger_status = %record.status,
                        "Ledger record exists, activating"
                    );
                    contract.activate_access(caller, pair, &hash, &timestamp).await
                }
            },
            LedgerGate::Revoke => {
                tracing::debug!(
                    operation = operations::LEDGER_REVOKE,
                    pair = %pair,
                    "Revoking on ledger"
                );
                contract.revoke_access(caller, pair, &hash, &timestamp).await
            }
            LedgerGate::Activate => {
                match contract.activate_access(caller, pair, &hash, &timestamp).await {
                    Err(BridgeError::Ledger(e)) if e.is_not_found() => {
                        tracing::info!(
                            operation = operations::LEDGER_CREATE,
                            pair = %pair,
                            "Nothing to activate on ledger, creating record"
                        );
                        contract.create_record(caller, pair, &hash, &timestamp).await
                    }
                    other => other,
                }
            }
        }
    }
}
