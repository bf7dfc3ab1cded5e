//! Logging Conventions
//!
//! Field names and operation labels shared by every crate in the workspace,
//! so that a single pair or ledger call can be followed across the gateway,
//! the bridge and the stores.
//!
//! # Levels
//!
//! | Level | Used for |
//! |-------|----------|
//! | ERROR | Integrity mismatch, ledger/mirror divergence, store corruption |
//! | WARN  | Ledger call failed, access denied, mirror left unchanged |
//! | INFO  | Status transition committed, document updated |
//! | DEBUG | Ledger call issued, connection opened/closed |
//! | TRACE | Raw ledger payloads |
//!
//! Key material, plaintext documents and private keys are never logged.
//! Content hashes may be.
//!
//! ```ignore
//! tracing::info!(
//!     patient_id = %pair.patient_id,
//!     doctor_id = %pair.doctor_id,
//!     status = %to,
//!     "Access status committed"
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Verbosity level, mirroring `tracing::Level`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Whether a message at `self` is emitted when the filter is `max_level`
    pub fn is_enabled(&self, max_level: LogLevel) -> bool {
        *self <= max_level
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation labels
pub mod operations {
    // Status machine
    pub const STATUS_UPDATE: &str = "status_update";
    pub const LEDGER_CREATE: &str = "ledger_create";
    pub const LEDGER_ACTIVATE: &str = "ledger_activate";
    pub const LEDGER_REVOKE: &str = "ledger_revoke";

    // Document flow
    pub const RECORD_ACCESS: &str = "record_access";
    pub const RECORD_UPDATE: &str = "record_update";
    pub const DOCUMENT_VIEW: &str = "document_view";
    pub const INTEGRITY_CHECK: &str = "integrity_check";

    // Mirror maintenance
    pub const RECONCILE: &str = "reconcile";

    // Gateway
    pub const CONNECT: &str = "connect";
    pub const INVOKE: &str = "invoke";
}

/// Upper bound on ledger payload bytes echoed at TRACE level
pub const MAX_PAYLOAD_LOG_BYTES: usize = 512;

/// Truncate a ledger payload for logging
pub fn payload_preview(payload: &[u8]) -> String {
    let end = payload.len().min(MAX_PAYLOAD_LOG_BYTES);
    let mut preview = String::from_utf8_lossy(&payload[..end]).into_owned();
    if payload.len() > end {
        preview.push_str("...");
    }
    preview
}

/// Identity attached to an operation's log lines
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    pub actor_id: Option<String>,
    pub org_id: Option<String>,
    pub operation: Option<&'static str>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_operation(mut self, op: &'static str) -> Self {
        self.operation = Some(op);
        self
    }

    /// Span carrying this context
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "ehr",
            actor_id = self.actor_id.as_deref().unwrap_or("-"),
            org_id = self.org_id.as_deref().unwrap_or("-"),
            operation = self.operation.unwrap_or("-"),
        )
    }
}
