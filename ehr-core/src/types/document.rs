//! EHR Document
//!
//! The plaintext clinical record. Field order is fixed by the struct
//! definition, which makes its JSON form canonical for hashing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plaintext electronic health record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EhrDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ehr_id: Option<String>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub doctor_notes: String,
    #[serde(default)]
    pub patient_history: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub lab_results: String,
    #[serde(default)]
    pub imaging_reports: String,
    #[serde(default)]
    pub vital_signs: String,
    #[serde(default)]
    pub family_history: String,
    #[serde(default)]
    pub lifestyle_factors: String,
    #[serde(default)]
    pub immunizations: String,
    #[serde(default)]
    pub care_plan: String,
    #[serde(default)]
    pub follow_up_instructions: String,
}

impl EhrDocument {
    /// Empty document, used as the attested content when a patient has no record yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Canonical serialized form
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Encrypted record as held by the local record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub patient_id: String,
    /// Codec output (nonce followed by AEAD ciphertext)
    pub ciphertext: Vec<u8>,
    /// Reference of the key that sealed this record
    pub key_ref: String,
    pub updated_at: DateTime<Utc>,
}

impl EncryptedRecord {
    pub fn new(patient_id: impl Into<String>, ciphertext: Vec<u8>, key_ref: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            ciphertext,
            key_ref: key_ref.into(),
            updated_at: Utc::now(),
        }
    }
}
