//! Consent Bridge
//!
//! Coordinates the two sources of truth for EHR access: the local status
//! mirror and encrypted record store, and the ledger that holds who may
//! currently read which record.
//!
//! # Write-after-confirm
//!
//! Local state changes only after the ledger call gating it returned
//! success. A failed, timed-out or cancelled ledger call leaves both local
//! stores exactly as they were. There is no two-phase commit: if the local
//! write fails after the ledger committed, the ledger wins and
//! [`Reconciler::reconcile_mirror`] repairs the mirror.
//!
//! # Usage
//!
//! ```no_run
//! use bridge::{BridgeConfig, Caller, EhrBridge, KeyConfig};
//! use ehr_store::{open_stores, StoreConfig};
//! use ledger_gateway::{GatewayConfig, HttpLedgerGateway};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let bridge = EhrBridge::new(
//!     HttpLedgerGateway::from_config(GatewayConfig::from_env()),
//!     open_stores(&StoreConfig::from_env())?,
//!     KeyConfig::from_env().codec().await?,
//!     BridgeConfig::from_env(),
//! );
//!
//! let doctor = Caller::new("dr1", "Org1MSP");
//! let patient = Caller::new("pt1", "Org1MSP");
//! bridge.access().request(&doctor, "pt1").await?;
//! bridge.access().accept(&patient, "dr1").await?;
//! let doc = bridge.reconciler().view_document(&doctor, "pt1").await?;
//! println!("{}", doc.diagnosis);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod locks;
pub mod reconciler;
pub mod service;
pub mod state_machine;
pub mod vault;

pub use config::{BridgeConfig, KeyConfig};
pub use contract::{functions, Caller, EhrContract};
pub use error::{BridgeError, BridgeResult};
pub use locks::{KeyGuard, KeyedLocks, PairLocks, PatientLocks};
pub use reconciler::Reconciler;
pub use service::EhrBridge;
pub use state_machine::AccessStateMachine;
pub use vault::{RecordVault, SealedDocument};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
