//! EHR Core - Consent-Gated Record Domain
//!
//! Shared vocabulary for the consent-gated ledger synchronization engine:
//!
//! - **types**: access requests, the closed status/action enumerations and
//!   their transition table, the EHR document, and the ledger's view of a
//!   (patient, doctor) access record
//! - **codec**: symmetric encryption of EHR payloads with an injected key and
//!   the deterministic content hash that is committed to the ledger
//! - **logging**: structured field names and level conventions
//!
//! # Two Sources of Truth
//!
//! ```text
//! ┌────────────────────────────┐        ┌────────────────────────────┐
//! │   Ledger (authoritative)   │        │   Local stores (cache)     │
//! │  status: active / revoked  │◄──────►│  AccessRequest.status      │
//! │  events: creation, update, │ verify │  EncryptedRecord (cipher)  │
//! │  access, revoke, activate  │        │                            │
//! └────────────────────────────┘        └────────────────────────────┘
//! ```
//!
//! The ledger decides whether access is granted. Local status is a mirror that
//! is only written after the corresponding ledger call has succeeded.

pub mod codec;
pub mod error;
pub mod logging;
pub mod types;

pub use codec::{
    ContentHash, KeyMaterial, KeyProvider, KeyProviderError, LocalKeyProvider, RecordCodec,
    StaticKeyProvider,
};
pub use error::{CoreError, CoreResult};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
