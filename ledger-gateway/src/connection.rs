//! Per-Call Connection Context
//!
//! A [`ConnectionContext`] bundles everything one ledger call needs: the
//! caller's identity, a signer derived from it, and a TLS channel trusting
//! only the peer's CA. It is built at the start of a call, owned by that
//! call alone, and released when dropped. Because release happens in `Drop`,
//! it runs on success, on every error path, and when the calling future is
//! cancelled or times out.
//!
//! # Proposal Signing
//!
//! ```text
//! tx_id     = hex(SHA-256(nonce ‖ creator certificate))
//! digest    = SHA-256(canonical JSON of Proposal)
//! signature = Ed25519(PROPOSAL_DOMAIN ‖ digest)
//! ```

use chrono::{SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use zeroize::{Zeroize, Zeroizing};

use crate::client::InvokeRequest;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{Identity, PeerEndpoint};

/// Domain separation tag for proposal signatures
pub const PROPOSAL_DOMAIN: &[u8] = b"EHR:Proposal:v1\0";

const NONCE_SIZE: usize = 24;

/// Ed25519 signer bound to one identity
pub struct ProposalSigner {
    signing_key: SigningKey,
    public_key_hex: String,
}

impl ProposalSigner {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let public_key_hex = hex::encode(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            public_key_hex,
        }
    }

    /// Parse a wallet private key: PEM-encoded PKCS#8, or 32 raw bytes in hex
    pub fn from_private_key(encoded: &str) -> LedgerResult<Self> {
        let trimmed = encoded.trim();
        if trimmed.starts_with("-----BEGIN") {
            use ed25519_dalek::pkcs8::DecodePrivateKey;
            let signing_key = SigningKey::from_pkcs8_pem(trimmed).map_err(|e| {
                LedgerError::configuration(format!("Invalid PKCS#8 private key: {}", e))
            })?;
            return Ok(Self::from_bytes(&signing_key.to_bytes()));
        }

        let bytes = Zeroizing::new(hex::decode(trimmed).map_err(|e| {
            LedgerError::configuration(format!("Private key is neither PEM nor hex: {}", e))
        })?);
        let mut arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            LedgerError::configuration(format!(
                "Invalid private key length: expected 32, got {}",
                bytes.len()
            ))
        })?;
        let signer = Self::from_bytes(&arr);
        arr.zeroize();
        Ok(signer)
    }

    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_bytes(&signing_key.to_bytes())
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// Sign a proposal
    pub fn sign(&self, proposal: Proposal) -> LedgerResult<SignedProposal> {
        let digest = proposal.digest()?;
        let signature = self.signing_key.sign(&signing_input(&digest));
        Ok(SignedProposal {
            proposal,
            signature: hex::encode(signature.to_bytes()),
            public_key: self.public_key_hex.clone(),
        })
    }
}

fn signing_input(digest: &[u8; 32]) -> Vec<u8> {
    let mut input = Vec::with_capacity(PROPOSAL_DOMAIN.len() + digest.len());
    input.extend_from_slice(PROPOSAL_DOMAIN);
    input.extend_from_slice(digest);
    input
}

/// Identity that created a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub msp_id: String,
    pub certificate: String,
}

/// Unsigned transaction proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub tx_id: String,
    /// Hex-encoded random nonce
    pub nonce: String,
    pub channel: String,
    pub contract: String,
    pub function: String,
    pub args: Vec<String>,
    pub creator: Creator,
    pub timestamp: String,
}

impl Proposal {
    pub fn new(request: &InvokeRequest, identity: &Identity) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        Self {
            tx_id: transaction_id(&nonce, &identity.certificate),
            nonce: hex::encode(nonce),
            channel: request.channel.clone(),
            contract: request.contract.clone(),
            function: request.function.clone(),
            args: request.args.clone(),
            creator: Creator {
                msp_id: identity.msp_id.clone(),
                certificate: identity.certificate.clone(),
            },
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// SHA-256 of the canonical JSON form
    pub fn digest(&self) -> LedgerResult<[u8; 32]> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| LedgerError::Unknown(format!("Proposal serialization failed: {}", e)))?;
        Ok(Sha256::digest(&bytes).into())
    }
}

/// Transaction id for a nonce and creator certificate
pub fn transaction_id(nonce: &[u8], certificate: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(certificate.as_bytes());
    hex::encode(hasher.finalize())
}

/// Proposal plus creator signature, as sent to the peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedProposal {
    pub proposal: Proposal,
    pub signature: String,
    pub public_key: String,
}

impl SignedProposal {
    /// Check the transaction id and signature
    pub fn verify(&self) -> LedgerResult<()> {
        let nonce = hex::decode(&self.proposal.nonce)
            .map_err(|e| LedgerError::Unknown(format!("Invalid nonce: {}", e)))?;
        if transaction_id(&nonce, &self.proposal.creator.certificate) != self.proposal.tx_id {
            return Err(LedgerError::Unknown("Transaction id mismatch".to_string()));
        }

        let pk: [u8; 32] = hex::decode(&self.public_key)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| LedgerError::Unknown("Invalid public key".to_string()))?;
        let verifying_key = VerifyingKey::from_bytes(&pk)
            .map_err(|e| LedgerError::Unknown(format!("Invalid public key: {}", e)))?;

        let sig_bytes = hex::decode(&self.signature)
            .map_err(|e| LedgerError::Unknown(format!("Invalid signature encoding: {}", e)))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|e| LedgerError::Unknown(format!("Invalid signature: {}", e)))?;

        let digest = self.proposal.digest()?;
        verifying_key
            .verify(&signing_input(&digest), &signature)
            .map_err(|e| LedgerError::Unknown(format!("Signature verification failed: {}", e)))
    }
}

/// Counts live connection contexts
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicUsize>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    fn lease(&self) -> Lease {
        self.open.fetch_add(1, Ordering::SeqCst);
        Lease {
            open: Arc::clone(&self.open),
        }
    }
}

struct Lease {
    open: Arc<AtomicUsize>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Channel settings for a new connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub timeout: Duration,
    /// Permit `http://` and `grpc://` peers
    pub allow_insecure: bool,
}

/// Live, exclusively owned connection for one ledger call
pub struct ConnectionContext {
    identity: Identity,
    endpoint: PeerEndpoint,
    base_url: String,
    signer: ProposalSigner,
    http: reqwest::Client,
    _lease: Lease,
}

impl ConnectionContext {
    /// Build the signer and TLS channel for one call
    pub fn open(
        identity: Identity,
        endpoint: PeerEndpoint,
        options: ConnectOptions,
        tracker: &ConnectionTracker,
    ) -> LedgerResult<Self> {
        let (base_url, tls) = peer_base_url(&endpoint.url, options.allow_insecure)?;
        let signer = ProposalSigner::from_private_key(identity.private_key())?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(options.timeout)
            .pool_max_idle_per_host(0);
        if tls {
            if endpoint.tls_ca_pem.trim().is_empty() {
                return Err(LedgerError::configuration(format!(
                    "Peer {} has no TLS CA certificate",
                    endpoint.name
                )));
            }
            let ca = reqwest::Certificate::from_pem(endpoint.tls_ca_pem.as_bytes()).map_err(|e| {
                LedgerError::configuration(format!("Invalid TLS CA for {}: {}", endpoint.name, e))
            })?;
            // The connection profile's CA is the only trust root.
            builder = builder.tls_built_in_root_certs(false).add_root_certificate(ca);
        }
        let http = builder
            .build()
            .map_err(|e| LedgerError::configuration(format!("Cannot build TLS channel: {}", e)))?;

        tracing::debug!(
            peer = %endpoint.name,
            actor_id = %identity.principal,
            org_id = %identity.msp_id,
            "Connection opened"
        );

        Ok(Self {
            identity,
            endpoint,
            base_url,
            signer,
            http,
            _lease: tracker.lease(),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn endpoint(&self) -> &PeerEndpoint {
        &self.endpoint
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Build and sign a proposal as this connection's identity
    pub fn propose(&self, request: &InvokeRequest) -> LedgerResult<SignedProposal> {
        self.signer.sign(Proposal::new(request, &self.identity))
    }
}

impl Drop for ConnectionContext {
    fn drop(&mut self) {
        tracing::debug!(
            peer = %self.endpoint.name,
            actor_id = %self.identity.principal,
            "Connection closed"
        );
    }
}

/// Map a profile URL to an HTTP base URL; returns whether TLS is required
pub fn peer_base_url(url: &str, allow_insecure: bool) -> LedgerResult<(String, bool)> {
    let url = url.trim().trim_end_matches('/');
    let (rest, tls) = if let Some(rest) = url.strip_prefix("grpcs://") {
        (rest, true)
    } else if let Some(rest) = url.strip_prefix("https://") {
        (rest, true)
    } else if let Some(rest) = url.strip_prefix("grpc://") {
        (rest, false)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (rest, false)
    } else {
        return Err(LedgerError::configuration(format!(
            "Unsupported peer URL scheme: {}",
            url
        )));
    };

    if rest.is_empty() {
        return Err(LedgerError::configuration("Peer URL has no host"));
    }
    if !tls && !allow_insecure {
        return Err(LedgerError::configuration(format!(
            "Peer {} is not TLS-secured and insecure peers are disabled",
            url
        )));
    }

    let scheme = if tls { "https" } else { "http" };
    Ok((format!("{}://{}", scheme, rest), tls))
}
