//! HTTP Peer Gateway
//!
//! Sends signed proposals to a peer's gateway endpoint:
//!
//! ```text
//! POST {peer}/channels/{channel}/chaincodes/{contract}/submit
//! POST {peer}/channels/{channel}/chaincodes/{contract}/evaluate
//! ```
//!
//! A 2xx body is the raw contract result. Failures are classified:
//! - JSON body with `"kind": "endorsement"` → `EndorsementFailure`
//! - any other non-2xx → `TransportFailure` with status and response headers
//! - connect, timeout or body errors → `TransportFailure` without status

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;

use ehr_core::logging::payload_preview;

use crate::client::{InvokeRequest, LedgerGateway};
use crate::config::GatewayConfig;
use crate::connection::{ConnectionContext, ConnectionTracker};
use crate::error::{EndorsementDetail, LedgerError, LedgerResult};
use crate::identity::{FileIdentitySource, IdentitySource};

/// Ledger gateway speaking to a remote peer over HTTP(S)
pub struct HttpLedgerGateway<I = FileIdentitySource> {
    identities: I,
    config: GatewayConfig,
    tracker: ConnectionTracker,
}

impl HttpLedgerGateway<FileIdentitySource> {
    /// Gateway reading credentials from `config.credential_dir`
    pub fn from_config(config: GatewayConfig) -> Self {
        let identities = FileIdentitySource::new(config.credential_dir.clone());
        Self::new(identities, config)
    }
}

impl<I: IdentitySource> HttpLedgerGateway<I> {
    pub fn new(identities: I, config: GatewayConfig) -> Self {
        Self {
            identities,
            config,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Number of connection contexts currently alive
    pub fn open_connections(&self) -> usize {
        self.tracker.open_connections()
    }

    async fn connect(&self, request: &InvokeRequest) -> LedgerResult<ConnectionContext> {
        let endpoint = self.identities.peer_endpoint(&request.org_id).await?;
        let identity = self
            .identities
            .identity(&request.org_id, &request.actor_id)
            .await?;
        ConnectionContext::open(identity, endpoint, self.config.connect_options(), &self.tracker)
    }

    async fn call(&self, request: &InvokeRequest) -> LedgerResult<Vec<u8>> {
        let ctx = self.connect(request).await?;
        let result = exchange(&ctx, request).await;
        drop(ctx);
        result
    }
}

#[async_trait]
impl<I: IdentitySource> LedgerGateway for HttpLedgerGateway<I> {
    async fn invoke(&self, request: &InvokeRequest) -> LedgerResult<Vec<u8>> {
        let started = Instant::now();
        tracing::debug!(
            function = %request.function,
            mode = %request.mode,
            actor_id = %request.actor_id,
            org_id = %request.org_id,
            args = ?request.args,
            "Invoking contract function"
        );

        let timeout = self.config.request_timeout();
        let result = match tokio::time::timeout(timeout, self.call(request)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::transport(format!(
                "{} timed out after {} ms",
                request.function,
                timeout.as_millis()
            ))),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(payload) => {
                tracing::debug!(
                    function = %request.function,
                    mode = %request.mode,
                    duration_ms,
                    "Contract function succeeded"
                );
                tracing::trace!(payload = %payload_preview(payload), "Contract result");
            }
            Err(e) => tracing::warn!(
                function = %request.function,
                mode = %request.mode,
                actor_id = %request.actor_id,
                org_id = %request.org_id,
                kind = %e.kind(),
                error = %e,
                duration_ms,
                "Contract function failed"
            ),
        }
        result
    }
}

async fn exchange(ctx: &ConnectionContext, request: &InvokeRequest) -> LedgerResult<Vec<u8>> {
    let signed = ctx.propose(request)?;
    let url = format!(
        "{}/channels/{}/chaincodes/{}/{}",
        ctx.base_url(),
        request.channel,
        request.contract,
        request.mode.as_str()
    );

    let response = ctx
        .http()
        .post(&url)
        .json(&signed)
        .send()
        .await
        .map_err(|e| {
            LedgerError::transport(format!("Request to {} failed: {}", ctx.endpoint().name, e))
        })?;

    let status = response.status();
    if status.is_success() {
        let body = response
            .bytes()
            .await
            .map_err(|e| LedgerError::transport(format!("Failed to read response: {}", e)))?;
        return Ok(body.to_vec());
    }

    let metadata = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect();
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status.as_u16(), &body, metadata))
}

#[derive(Deserialize)]
struct FailureBody {
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<EndorsementDetail>,
}

/// Classify a non-2xx peer response
pub fn classify_failure(status: u16, body: &str, metadata: Vec<(String, String)>) -> LedgerError {
    match serde_json::from_str::<FailureBody>(body) {
        Ok(failure) if failure.kind == "endorsement" => LedgerError::EndorsementFailure {
            message: failure.message,
            details: failure.details,
        },
        _ => LedgerError::TransportFailure {
            status: Some(status),
            message: if body.is_empty() {
                format!("Peer returned status {}", status)
            } else {
                body.to_string()
            },
            metadata,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endorsement_body_is_classified() {
        let body = r#"{"kind":"endorsement","message":"rejected","details":[{"peer":"peer0","message":"The EHR record pt1 does not exist"}]}"#;
        let err = classify_failure(500, body, vec![]);
        assert!(matches!(err, LedgerError::EndorsementFailure { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_failures_are_transport() {
        let err = classify_failure(
            503,
            "upstream unavailable",
            vec![("x-trace".to_string(), "abc".to_string())],
        );
        match err {
            LedgerError::TransportFailure {
                status, metadata, ..
            } => {
                assert_eq!(status, Some(503));
                assert_eq!(metadata[0].1, "abc");
            }
            other => panic!("unexpected {:?}", other),
        }

        let empty = classify_failure(502, "", vec![]);
        assert_eq!(empty.to_string(), "Transport failure (status 502): Peer returned status 502");

        let other_kind = classify_failure(500, r#"{"kind":"ordering","message":"x"}"#, vec![]);
        assert_eq!(other_kind.status_code(), Some(500));
    }
}
