//! Ledger Access Records
//!
//! The ledger's view of a (patient, doctor) pair, as returned by the EHR
//! contract's read functions. These are never persisted locally.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::access::{AccessStatus, PairKey};

/// Ledger-side activity flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Active,
    Revoked,
    /// Any value this client does not recognise; never treated as active
    #[serde(other)]
    Other,
}

impl LedgerStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, LedgerStatus::Active)
    }

    /// Mirror status implied by this ledger status
    pub fn mirror_status(&self) -> Option<AccessStatus> {
        match self {
            LedgerStatus::Active => Some(AccessStatus::Accepted),
            LedgerStatus::Revoked => Some(AccessStatus::Revoked),
            LedgerStatus::Other => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Active => "active",
            LedgerStatus::Revoked => "revoked",
            LedgerStatus::Other => "other",
        }
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of event appended to a ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Creation,
    Update,
    Access,
    Revoke,
    Activate,
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Events whose hash attests to new record content
    pub fn carries_content(&self) -> bool {
        matches!(self, EventKind::Creation | EventKind::Update)
    }
}

/// One entry of a record's append-only history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: String,
    #[serde(default)]
    pub hash: String,
}

/// Ledger record for a (patient, doctor) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccessRecord {
    pub patient_id: String,
    pub doctor_id: String,
    /// Most recently committed content hash
    #[serde(default)]
    pub hash: String,
    pub status: LedgerStatus,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<LedgerEvent>,
}

impl LedgerAccessRecord {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.patient_id.clone(), self.doctor_id.clone())
    }

    /// Latest creation/update event of this record
    pub fn latest_content_event(&self) -> Option<&LedgerEvent> {
        self.transactions
            .iter()
            .filter(|e| e.kind.carries_content())
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp))
    }

    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = &LedgerEvent> {
        self.transactions.iter().filter(move |e| e.kind == kind)
    }
}

/// A history entry enriched with the doctor whose record it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub doctor_id: String,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

/// Timestamp string passed to contract functions.
///
/// RFC 3339 in UTC with millisecond precision, so that ledger timestamps sort
/// lexicographically.
pub fn ledger_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
