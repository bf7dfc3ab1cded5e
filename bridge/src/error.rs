//! Bridge Error Types
//!
//! Every failure a consent transition or a gated document operation can end
//! in. Kinds stay distinguishable all the way to the caller: a denial is never
//! reported as a network problem or the other way round.

use std::fmt;
use thiserror::Error;

use ehr_core::types::PairKey;
use ehr_core::CoreError;
use ehr_store::StoreError;
use ledger_gateway::LedgerError;

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Ledger call failed (endorsement, transport, configuration or unknown)
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Transition attempted against a missing or incompatible access
    /// request, or a document write against existing content
    #[error("State conflict for {pair}: {reason}")]
    StateConflict { pair: String, reason: String },

    /// Local content does not match the hash committed on the ledger
    #[error("Integrity mismatch for patient {patient_id}: ledger has {expected}, local is {actual}")]
    IntegrityMismatch {
        patient_id: String,
        expected: String,
        actual: String,
    },

    /// Local store read or write failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Ledger reports the pair as not active
    #[error("Access denied for doctor {doctor_id} on patient {patient_id}: ledger status {reported}")]
    AccessDenied {
        patient_id: String,
        doctor_id: String,
        reported: String,
    },

    /// Patient has no stored record
    #[error("No EHR record stored for patient {0}")]
    RecordNotFound(String),

    /// Encryption, decryption, hashing or key failure
    #[error("Codec error: {0}")]
    Codec(CoreError),

    /// Ledger answered with a payload that does not parse
    #[error("Invalid response from {function}: {reason}")]
    InvalidLedgerResponse { function: String, reason: String },
}

/// Bridge result type
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<CoreError> for BridgeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingRequest {
                patient_id,
                doctor_id,
            } => BridgeError::StateConflict {
                pair: format!("{}/{}", patient_id, doctor_id),
                reason: "no access request exists".to_string(),
            },
            CoreError::IllegalTransition { from, action } => BridgeError::StateConflict {
                pair: String::new(),
                reason: format!("{} is not allowed from {}", action, from),
            },
            other => BridgeError::Codec(other),
        }
    }
}

impl BridgeError {
    pub fn conflict(pair: &PairKey, reason: impl fmt::Display) -> Self {
        BridgeError::StateConflict {
            pair: pair.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Document write refused because of what is already stored or attested
    pub fn document_conflict(patient_id: &str, reason: impl fmt::Display) -> Self {
        BridgeError::StateConflict {
            pair: patient_id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// `reported` is the ledger status, or a marker when there is no record
    pub fn access_denied(patient_id: &str, doctor_id: &str, reported: impl fmt::Display) -> Self {
        BridgeError::AccessDenied {
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            reported: reported.to_string(),
        }
    }

    /// Short label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Ledger(e) => e.kind().as_str(),
            BridgeError::StateConflict { .. } => "state_conflict",
            BridgeError::IntegrityMismatch { .. } => "integrity_mismatch",
            BridgeError::Storage(_) => "storage",
            BridgeError::AccessDenied { .. } => "access_denied",
            BridgeError::RecordNotFound(_) => "record_not_found",
            BridgeError::Codec(_) => "codec",
            BridgeError::InvalidLedgerResponse { .. } => "invalid_ledger_response",
        }
    }

    /// The ledger answered and said no
    pub fn is_denial(&self) -> bool {
        matches!(self, BridgeError::AccessDenied { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Ledger(e) => e.is_retryable(),
            BridgeError::Storage(StoreError::Backend(_)) => true,
            _ => false,
        }
    }

    /// Check if this is a hard invariant violation (non-recoverable)
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::IntegrityMismatch { .. } | BridgeError::Storage(StoreError::Corrupt { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehr_core::types::{AccessAction, AccessStatus, LedgerStatus};

    #[test]
    fn test_missing_request_becomes_state_conflict() {
        let err: BridgeError = CoreError::MissingRequest {
            patient_id: "pt1".into(),
            doctor_id: "dr1".into(),
        }
        .into();
        assert!(matches!(err, BridgeError::StateConflict { ref pair, .. } if pair == "pt1/dr1"));
        assert_eq!(err.kind(), "state_conflict");
    }

    #[test]
    fn test_illegal_transition_becomes_state_conflict() {
        let err: BridgeError = CoreError::IllegalTransition {
            from: AccessStatus::Accepted,
            action: AccessAction::Reject,
        }
        .into();
        assert!(matches!(err, BridgeError::StateConflict { .. }));
    }

    #[test]
    fn test_codec_errors_stay_codec() {
        let err: BridgeError = CoreError::Decryption("bad tag".into()).into();
        assert!(matches!(err, BridgeError::Codec(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_denial_distinct_from_transport() {
        let denied = BridgeError::access_denied("pt1", "dr1", LedgerStatus::Revoked);
        assert!(denied.is_denial());
        assert!(!denied.is_retryable());

        let transport = BridgeError::from(LedgerError::transport("connection reset"));
        assert!(!transport.is_denial());
        assert!(transport.is_retryable());
        assert_eq!(transport.kind(), "transport");
    }

    #[test]
    fn test_invariant_violations() {
        let mismatch = BridgeError::IntegrityMismatch {
            patient_id: "pt1".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(mismatch.is_invariant_violation());
        let corrupt = BridgeError::from(StoreError::Corrupt {
            key: "pt1/dr1".into(),
            reason: "bad".into(),
        });
        assert!(corrupt.is_invariant_violation());
        assert!(!BridgeError::RecordNotFound("pt1".into()).is_invariant_violation());
    }
}
