//! Access Requests and the Transition Table
//!
//! An [`AccessRequest`] is the local mirror of one (patient, doctor) pair.
//! Status and trigger are closed enumerations; [`plan_transition`] is the
//! single place that decides which moves are legal and which ledger function
//! (if any) gates them.
//!
//! | Action   | From                         | To        | Ledger gate              |
//! |----------|------------------------------|-----------|--------------------------|
//! | Request  | none or any                  | Requested | none                     |
//! | Accept   | any                          | Accepted  | create or activate       |
//! | Revoke   | any                          | Revoked   | revokeAccess             |
//! | Activate | any                          | Accepted  | activateAccess           |
//! | Reject   | Requested, Rejected          | Rejected  | none                     |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Identifies a (patient, doctor) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub patient_id: String,
    pub doctor_id: String,
}

impl PairKey {
    pub fn new(patient_id: impl Into<String>, doctor_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.patient_id, self.doctor_id)
    }
}

/// Resting status of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessStatus {
    /// Doctor asked, patient has not answered
    Requested,
    /// Ledger record is active
    Accepted,
    /// Ledger record is revoked
    Revoked,
    /// Patient declined a pending request (never reached the ledger)
    Rejected,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "Requested",
            Self::Accepted => "Accepted",
            Self::Revoked => "Revoked",
            Self::Rejected => "Rejected",
        }
    }

    /// All status values, in display order
    pub fn all() -> [AccessStatus; 4] {
        [Self::Requested, Self::Accepted, Self::Revoked, Self::Rejected]
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // "pending" is the label older mirrors used for open requests
            "requested" | "pending" => Ok(Self::Requested),
            "accepted" => Ok(Self::Accepted),
            "revoked" => Ok(Self::Revoked),
            "rejected" => Ok(Self::Rejected),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

/// Caller-supplied transition trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessAction {
    Request,
    Accept,
    Revoke,
    Activate,
    Reject,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "Request",
            Self::Accept => "Accept",
            Self::Revoke => "Revoke",
            Self::Activate => "Activate",
            Self::Reject => "Reject",
        }
    }

    /// Status the pair rests in once this action has succeeded
    pub fn target_status(&self) -> AccessStatus {
        match self {
            Self::Request => AccessStatus::Requested,
            Self::Accept | Self::Activate => AccessStatus::Accepted,
            Self::Revoke => AccessStatus::Revoked,
            Self::Reject => AccessStatus::Rejected,
        }
    }

    /// Ledger call that must succeed before the mirror may change
    pub fn ledger_gate(&self) -> LedgerGate {
        match self {
            Self::Request | Self::Reject => LedgerGate::None,
            Self::Accept => LedgerGate::CreateOrActivate,
            Self::Revoke => LedgerGate::Revoke,
            Self::Activate => LedgerGate::Activate,
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessAction {
    type Err = CoreError;

    /// Accepts both the verb and the status label callers historically sent
    /// (`"Accepted"`, `"Revoked"`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "request" | "requested" => Ok(Self::Request),
            "accept" | "accepted" => Ok(Self::Accept),
            "revoke" | "revoked" => Ok(Self::Revoke),
            "activate" => Ok(Self::Activate),
            "reject" | "rejected" => Ok(Self::Reject),
            _ => Err(CoreError::UnknownAction(s.to_string())),
        }
    }
}

/// Ledger interaction gating a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerGate {
    /// Purely local
    None,
    /// Look up the record; create it if absent, activate it otherwise
    CreateOrActivate,
    Revoke,
    Activate,
}

impl LedgerGate {
    pub fn is_local(&self) -> bool {
        matches!(self, LedgerGate::None)
    }
}

/// A planned, legal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<AccessStatus>,
    pub action: AccessAction,
    pub to: AccessStatus,
    pub gate: LedgerGate,
}

/// Decide whether `action` may run against the current mirror status.
///
/// `current` is `None` when no access request exists for the pair.
pub fn plan_transition(
    pair: &PairKey,
    current: Option<AccessStatus>,
    action: AccessAction,
) -> CoreResult<Transition> {
    let from = match (current, action) {
        (None, AccessAction::Request) => None,
        (None, _) => {
            return Err(CoreError::MissingRequest {
                patient_id: pair.patient_id.clone(),
                doctor_id: pair.doctor_id.clone(),
            })
        }
        // Rejecting a granted pair would leave the ledger active behind a
        // non-active mirror; a grant has to go through Revoke.
        (Some(s @ (AccessStatus::Accepted | AccessStatus::Revoked)), AccessAction::Reject) => {
            return Err(CoreError::IllegalTransition { from: s, action })
        }
        (Some(s), _) => Some(s),
    };

    Ok(Transition {
        from,
        action,
        to: action.target_status(),
        gate: action.ledger_gate(),
    })
}

/// Local mirror of one (patient, doctor) access relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Opaque identifier assigned when the request is first stored
    pub request_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub status: AccessStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Create a fresh request in `Requested`
    pub fn new(patient_id: impl Into<String>, doctor_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            request_id: format!("req:{}", uuid::Uuid::new_v4()),
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            status: AccessStatus::Requested,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(self.patient_id.clone(), self.doctor_id.clone())
    }

    /// Overwrite the status in place
    pub fn set_status(&mut self, status: AccessStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> PairKey {
        PairKey::new("pt1", "dr1")
    }

    #[test]
    fn test_action_parsing_accepts_status_labels() {
        assert_eq!("Accepted".parse::<AccessAction>().unwrap(), AccessAction::Accept);
        assert_eq!("revoke".parse::<AccessAction>().unwrap(), AccessAction::Revoke);
        assert_eq!("ACTIVATE".parse::<AccessAction>().unwrap(), AccessAction::Activate);
        assert!(matches!(
            "Suspend".parse::<AccessAction>(),
            Err(CoreError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_status_parsing_maps_legacy_pending() {
        assert_eq!("Pending".parse::<AccessStatus>().unwrap(), AccessStatus::Requested);
        assert_eq!("revoked".parse::<AccessStatus>().unwrap(), AccessStatus::Revoked);
        assert!("active".parse::<AccessStatus>().is_err());
    }

    #[test]
    fn test_request_is_local_from_any_state() {
        for current in [None, Some(AccessStatus::Accepted), Some(AccessStatus::Revoked)] {
            let t = plan_transition(&pair(), current, AccessAction::Request).unwrap();
            assert_eq!(t.to, AccessStatus::Requested);
            assert!(t.gate.is_local());
        }
    }

    #[test]
    fn test_gated_actions_require_existing_request() {
        for action in [AccessAction::Accept, AccessAction::Revoke, AccessAction::Activate] {
            let err = plan_transition(&pair(), None, action).unwrap_err();
            assert!(matches!(err, CoreError::MissingRequest { .. }));
        }
    }

    #[test]
    fn test_gates_per_action() {
        let current = Some(AccessStatus::Requested);
        let accept = plan_transition(&pair(), current, AccessAction::Accept).unwrap();
        assert_eq!(accept.gate, LedgerGate::CreateOrActivate);
        assert_eq!(accept.to, AccessStatus::Accepted);

        let revoke = plan_transition(&pair(), Some(AccessStatus::Accepted), AccessAction::Revoke)
            .unwrap();
        assert_eq!(revoke.gate, LedgerGate::Revoke);
        assert_eq!(revoke.to, AccessStatus::Revoked);

        let activate =
            plan_transition(&pair(), Some(AccessStatus::Revoked), AccessAction::Activate).unwrap();
        assert_eq!(activate.gate, LedgerGate::Activate);
        assert_eq!(activate.to, AccessStatus::Accepted);
    }

    #[test]
    fn test_revoked_is_not_terminal() {
        let t = plan_transition(&pair(), Some(AccessStatus::Revoked), AccessAction::Accept).unwrap();
        assert_eq!(t.to, AccessStatus::Accepted);
    }

    #[test]
    fn test_reject_only_from_open_requests() {
        assert!(plan_transition(&pair(), Some(AccessStatus::Requested), AccessAction::Reject).is_ok());
        assert!(matches!(
            plan_transition(&pair(), Some(AccessStatus::Accepted), AccessAction::Reject),
            Err(CoreError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_set_status_touches_updated_at() {
        let mut req = AccessRequest::new("pt1", "dr1");
        let created = req.updated_at;
        req.set_status(AccessStatus::Accepted);
        assert_eq!(req.status, AccessStatus::Accepted);
        assert!(req.updated_at >= created);
        assert!(req.request_id.starts_with("req:"));
    }
}
