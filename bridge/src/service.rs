//! Bridge service wiring
//!
//! [`EhrBridge`] owns the contract client, both local stores and the codec,
//! and hands shared access to the state machine and the reconciler.

use std::sync::Arc;

use ehr_core::RecordCodec;
use ehr_store::{StatusMirror, Stores};
use ledger_gateway::LedgerGateway;

use crate::config::BridgeConfig;
use crate::contract::EhrContract;
use crate::locks::{PairLocks, PatientLocks};
use crate::reconciler::Reconciler;
use crate::state_machine::AccessStateMachine;
use crate::vault::RecordVault;

pub(crate) struct Shared<G> {
    pub(crate) contract: EhrContract<G>,
    pub(crate) mirror: Arc<dyn StatusMirror>,
    pub(crate) vault: RecordVault,
    pub(crate) locks: PairLocks,
    pub(crate) documents: PatientLocks,
    pub(crate) config: BridgeConfig,
}

/// Consent state machine and reconciler over one set of stores
pub struct EhrBridge<G> {
    shared: Arc<Shared<G>>,
    access: AccessStateMachine<G>,
    reconciler: Reconciler<G>,
}

impl<G: LedgerGateway> EhrBridge<G> {
    pub fn new(gateway: G, stores: Stores, codec: RecordCodec, config: BridgeConfig) -> Self {
        let shared = Arc::new(Shared {
            contract: EhrContract::new(gateway, &config),
            mirror: stores.mirror,
            vault: RecordVault::new(stores.records, Arc::new(codec)),
            locks: PairLocks::new(),
            documents: PatientLocks::new(),
            config,
        });
        Self {
            access: AccessStateMachine::new(shared.clone()),
            reconciler: Reconciler::new(shared.clone()),
            shared,
        }
    }

    pub fn access(&self) -> &AccessStateMachine<G> {
        &self.access
    }

    pub fn reconciler(&self) -> &Reconciler<G> {
        &self.reconciler
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn gateway(&self) -> &G {
        self.shared.contract.gateway()
    }

    pub fn mirror(&self) -> &Arc<dyn StatusMirror> {
        &self.shared.mirror
    }
}
