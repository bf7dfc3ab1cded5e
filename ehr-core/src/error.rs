//! Error types for EHR Core

use thiserror::Error;

use crate::types::{AccessAction, AccessStatus};

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Key management error: {0}")]
    KeyManagement(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown access action: {0}")]
    UnknownAction(String),

    #[error("Unknown access status: {0}")]
    UnknownStatus(String),

    #[error("No access request exists for patient {patient_id} and doctor {doctor_id}")]
    MissingRequest {
        patient_id: String,
        doctor_id: String,
    },

    #[error("Illegal transition: {action} from {from}")]
    IllegalTransition {
        from: AccessStatus,
        action: AccessAction,
    },
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
