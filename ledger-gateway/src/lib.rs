//! Ledger Gateway
//!
//! Transaction client for the permissioned ledger that holds the
//! authoritative record of who may access which patient's EHR.
//!
//! # Call Lifecycle
//!
//! ```text
//! invoke(request)
//!   ├─ resolve peer endpoint + identity   (IdentitySource)
//!   ├─ open ConnectionContext              (signer + TLS channel, leased)
//!   ├─ sign proposal, POST submit|evaluate
//!   ├─ classify failure                    (LedgerError)
//!   └─ drop ConnectionContext              (every exit path)
//! ```
//!
//! Contexts are never pooled or shared: each call creates and exclusively
//! owns one. The gateway performs exactly one attempt per call; retry policy
//! belongs to the caller.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod identity;
pub mod mock;

pub use client::{InvokeMode, InvokeRequest, LedgerGateway};
pub use config::GatewayConfig;
pub use connection::{
    ConnectOptions, ConnectionContext, ConnectionTracker, Proposal, ProposalSigner,
    SignedProposal,
};
pub use error::{EndorsementDetail, LedgerError, LedgerErrorKind, LedgerResult};
pub use http::HttpLedgerGateway;
pub use identity::{org_dir_name, FileIdentitySource, Identity, IdentitySource, PeerEndpoint};
pub use mock::{MockLedgerGateway, RecordedCall};
