//! Domain types

pub mod access;
pub mod document;
pub mod ledger;

pub use access::{
    plan_transition, AccessAction, AccessRequest, AccessStatus, LedgerGate, PairKey, Transition,
};
pub use document::{EhrDocument, EncryptedRecord};
pub use ledger::{
    ledger_timestamp, EventKind, HistoryEntry, LedgerAccessRecord, LedgerEvent, LedgerStatus,
};
