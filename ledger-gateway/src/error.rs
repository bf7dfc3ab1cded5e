//! Ledger Error Taxonomy
//!
//! Every failed `invoke` is classified into exactly one of four classes.
//! Callers decide retry policy from the class; the gateway never retries.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rejection reported by a single endorsing peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementDetail {
    pub peer: String,
    pub message: String,
}

/// Ledger gateway errors
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Peers rejected the proposal
    #[error("Endorsement failed: {message}")]
    EndorsementFailure {
        message: String,
        details: Vec<EndorsementDetail>,
    },

    /// Network or channel level failure
    #[error("Transport failure ({}): {message}", status_label(.status))]
    TransportFailure {
        /// Status code reported by the peer, if one was received
        status: Option<u16>,
        message: String,
        /// Trailer/header metadata returned with the failure
        metadata: Vec<(String, String)>,
    },

    /// Missing or invalid identity, connection profile or credential file
    #[error("Configuration failure: {0}")]
    ConfigurationFailure(String),

    /// Anything else
    #[error("Unknown ledger error: {0}")]
    Unknown(String),
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no status".to_string(),
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Coarse class of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerErrorKind {
    Endorsement,
    Transport,
    Configuration,
    Unknown,
}

impl LedgerErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Endorsement => "endorsement",
            Self::Transport => "transport",
            Self::Configuration => "configuration",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LedgerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker the contract uses when a record is absent
const NOT_FOUND_MARKER: &str = "does not exist";

impl LedgerError {
    pub fn endorsement(message: impl Into<String>) -> Self {
        LedgerError::EndorsementFailure {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        LedgerError::TransportFailure {
            status: None,
            message: message.into(),
            metadata: Vec::new(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        LedgerError::ConfigurationFailure(message.into())
    }

    pub fn kind(&self) -> LedgerErrorKind {
        match self {
            LedgerError::EndorsementFailure { .. } => LedgerErrorKind::Endorsement,
            LedgerError::TransportFailure { .. } => LedgerErrorKind::Transport,
            LedgerError::ConfigurationFailure(_) => LedgerErrorKind::Configuration,
            LedgerError::Unknown(_) => LedgerErrorKind::Unknown,
        }
    }

    /// Check if a caller may reasonably retry
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::TransportFailure { status, .. } => {
                // 4xx other than 408/429 means the request itself is bad
                !matches!(status, Some(code) if (400..500).contains(code) && *code != 408 && *code != 429)
            }
            LedgerError::EndorsementFailure { .. } => self.is_read_conflict(),
            LedgerError::ConfigurationFailure(_) | LedgerError::Unknown(_) => false,
        }
    }

    /// Get suggested retry delay in milliseconds
    pub fn suggested_retry_delay_ms(&self) -> Option<u64> {
        if !self.is_retryable() {
            return None;
        }
        match self {
            LedgerError::TransportFailure { .. } => Some(2000),
            LedgerError::EndorsementFailure { .. } => Some(500),
            _ => None,
        }
    }

    /// The contract reported that the addressed record does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            LedgerError::EndorsementFailure { message, details } => {
                message.contains(NOT_FOUND_MARKER)
                    || details.iter().any(|d| d.message.contains(NOT_FOUND_MARKER))
            }
            _ => false,
        }
    }

    /// Two conflicting writes to the same key raced; the loser gets this
    pub fn is_read_conflict(&self) -> bool {
        match self {
            LedgerError::EndorsementFailure { message, details } => {
                message.contains("MVCC_READ_CONFLICT")
                    || details.iter().any(|d| d.message.contains("MVCC_READ_CONFLICT"))
            }
            _ => false,
        }
    }

    /// Status code of a transport failure
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LedgerError::TransportFailure { status, .. } => *status,
            _ => None,
        }
    }
}
