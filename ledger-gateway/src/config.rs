//! Gateway Configuration
//!
//! Loaded from environment variables with the `EHR_LEDGER_` prefix.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::connection::ConnectOptions;

fn default_timeout_ms() -> u64 {
    30_000
}

/// Ledger gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Root of the per-organization credential directories
    pub credential_dir: PathBuf,
    /// Upper bound on one invocation, connection setup included
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Permit plain-text peers (development only)
    #[serde(default)]
    pub allow_insecure: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            credential_dir: PathBuf::from("network"),
            request_timeout_ms: default_timeout_ms(),
            allow_insecure: false,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - EHR_LEDGER_CREDENTIAL_DIR: credential root directory
    /// - EHR_LEDGER_TIMEOUT_MS: per-call timeout in milliseconds
    /// - EHR_LEDGER_ALLOW_INSECURE: "true" to accept http:// and grpc:// peers
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            credential_dir: env::var("EHR_LEDGER_CREDENTIAL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.credential_dir),
            request_timeout_ms: env::var("EHR_LEDGER_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
            allow_insecure: env::var("EHR_LEDGER_ALLOW_INSECURE")
                .ok()
                .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.allow_insecure),
        }
    }

    /// Local development against a plain-text peer
    pub fn development(credential_dir: impl Into<PathBuf>) -> Self {
        Self {
            credential_dir: credential_dir.into(),
            request_timeout_ms: 5_000,
            allow_insecure: true,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            timeout: self.request_timeout(),
            allow_insecure: self.allow_insecure,
        }
    }
}
