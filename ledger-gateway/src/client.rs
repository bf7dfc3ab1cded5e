//! Ledger Gateway Client
//!
//! The single entry point through which the rest of the system reaches the
//! ledger. Implementations:
//! - [`HttpLedgerGateway`](crate::HttpLedgerGateway): remote peer over TLS
//! - [`MockLedgerGateway`](crate::MockLedgerGateway): in-memory contract for tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::LedgerResult;

/// How a contract function is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeMode {
    /// Endorse, order and commit. Returns once the commit is final.
    Submit,
    /// Read-only query against one peer; nothing is committed
    Evaluate,
}

impl InvokeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvokeMode::Submit => "submit",
            InvokeMode::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for InvokeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contract invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub mode: InvokeMode,
    pub channel: String,
    pub contract: String,
    pub function: String,
    /// Positional string arguments, in contract order
    pub args: Vec<String>,
    /// Principal the call is made as
    pub actor_id: String,
    /// Membership organization of the principal (e.g. `Org1MSP`)
    pub org_id: String,
}

impl InvokeRequest {
    pub fn new(
        mode: InvokeMode,
        channel: impl Into<String>,
        contract: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            channel: channel.into(),
            contract: contract.into(),
            function: function.into(),
            args: Vec::new(),
            actor_id: String::new(),
            org_id: String::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_actor(mut self, actor_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        self.actor_id = actor_id.into();
        self.org_id = org_id.into();
        self
    }
}

/// Ledger gateway trait
///
/// Each call is a single attempt over a connection that exists only for that
/// call. The response payload is returned untouched; interpreting it is the
/// caller's job.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> LedgerResult<Vec<u8>>;
}

#[async_trait]
impl<T: LedgerGateway + ?Sized> LedgerGateway for Arc<T> {
    async fn invoke(&self, request: &InvokeRequest) -> LedgerResult<Vec<u8>> {
        (**self).invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = InvokeRequest::new(InvokeMode::Submit, "mychannel", "ehr", "recordAccess")
            .with_args(["dr1", "pt1", "abc", "2024-01-01T00:00:00.000Z"])
            .as_actor("dr1", "Org2MSP");
        assert_eq!(req.args.len(), 4);
        assert_eq!(req.args[0], "dr1");
        assert_eq!(req.org_id, "Org2MSP");
        assert_eq!(req.mode.to_string(), "submit");
    }
}
