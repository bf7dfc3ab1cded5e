//! Identity and Peer Resolution
//!
//! Resolves an organization to a peer endpoint plus TLS trust anchor, and a
//! principal within it to a certificate and private key.
//!
//! # File Layout
//!
//! ```text
//! <base>/
//! └── org1/                          (from "Org1MSP")
//!     ├── connection-org1.json       organizations.<Org>.peers[0] → peers.<peer>.{url, tlsCACerts.pem}
//!     └── wallet/
//!         └── <principal>.id         credentials.{certificate, privateKey}
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::error::{LedgerError, LedgerResult};

/// Peer to send proposals to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEndpoint {
    pub name: String,
    pub url: String,
    /// PEM trust anchor for the peer's TLS certificate
    pub tls_ca_pem: String,
}

/// Signing identity of one principal
#[derive(Clone)]
pub struct Identity {
    pub msp_id: String,
    pub principal: String,
    /// PEM certificate presented as the proposal creator
    pub certificate: String,
    private_key: Zeroizing<String>,
}

impl Identity {
    pub fn new(
        msp_id: impl Into<String>,
        principal: impl Into<String>,
        certificate: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            msp_id: msp_id.into(),
            principal: principal.into(),
            certificate: certificate.into(),
            private_key: Zeroizing::new(private_key.into()),
        }
    }

    /// Private key as stored (PEM PKCS#8 or hex)
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("msp_id", &self.msp_id)
            .field("principal", &self.principal)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Source of peer endpoints and identities
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn peer_endpoint(&self, org_id: &str) -> LedgerResult<PeerEndpoint>;

    async fn identity(&self, org_id: &str, principal: &str) -> LedgerResult<Identity>;
}

/// Directory name of an organization: `Org1MSP` → `org1`
pub fn org_dir_name(msp_id: &str) -> String {
    msp_id
        .strip_suffix("MSP")
        .unwrap_or(msp_id)
        .to_ascii_lowercase()
}

#[derive(Deserialize)]
struct ConnectionProfile {
    #[serde(default)]
    organizations: HashMap<String, ProfileOrganization>,
    #[serde(default)]
    peers: HashMap<String, ProfilePeer>,
}

#[derive(Deserialize)]
struct ProfileOrganization {
    #[serde(default)]
    peers: Vec<String>,
}

#[derive(Deserialize)]
struct ProfilePeer {
    url: String,
    #[serde(rename = "tlsCACerts", default)]
    tls_ca_certs: Option<ProfileTls>,
}

#[derive(Deserialize)]
struct ProfileTls {
    pem: String,
}

#[derive(Deserialize)]
struct WalletEntry {
    credentials: WalletCredentials,
    #[serde(rename = "mspId", default)]
    msp_id: Option<String>,
}

#[derive(Deserialize)]
struct WalletCredentials {
    certificate: String,
    #[serde(rename = "privateKey")]
    private_key: String,
}

/// Identity source backed by per-organization directories
#[derive(Debug, Clone)]
pub struct FileIdentitySource {
    base_dir: PathBuf,
}

impl FileIdentitySource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn org_dir(&self, org_id: &str) -> PathBuf {
        self.base_dir.join(org_dir_name(org_id))
    }

    fn profile_path(&self, org_id: &str) -> PathBuf {
        let org = org_dir_name(org_id);
        self.org_dir(org_id).join(format!("connection-{}.json", org))
    }

    fn wallet_path(&self, org_id: &str, principal: &str) -> PathBuf {
        self.org_dir(org_id)
            .join("wallet")
            .join(format!("{}.id", principal))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> LedgerResult<T> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            LedgerError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            LedgerError::configuration(format!("Invalid JSON in {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl IdentitySource for FileIdentitySource {
    async fn peer_endpoint(&self, org_id: &str) -> LedgerResult<PeerEndpoint> {
        let path = self.profile_path(org_id);
        let profile: ConnectionProfile = Self::read_json(&path).await?;

        // Profiles key organizations by display name ("Org1"), not MSP id
        let org_name = org_id.strip_suffix("MSP").unwrap_or(org_id);
        let org = profile
            .organizations
            .get(org_name)
            .or_else(|| profile.organizations.get(org_id))
            .ok_or_else(|| {
                LedgerError::configuration(format!(
                    "Organization {} missing from {}",
                    org_name,
                    path.display()
                ))
            })?;

        let peer_name = org.peers.first().ok_or_else(|| {
            LedgerError::configuration(format!("Organization {} lists no peers", org_name))
        })?;

        let peer = profile.peers.get(peer_name).ok_or_else(|| {
            LedgerError::configuration(format!("Peer {} missing from {}", peer_name, path.display()))
        })?;

        Ok(PeerEndpoint {
            name: peer_name.clone(),
            url: peer.url.clone(),
            tls_ca_pem: peer
                .tls_ca_certs
                .as_ref()
                .map(|t| t.pem.clone())
                .unwrap_or_default(),
        })
    }

    async fn identity(&self, org_id: &str, principal: &str) -> LedgerResult<Identity> {
        if principal.is_empty() || principal.contains(|c: char| c == '/' || c == '\\') || principal == ".." {
            return Err(LedgerError::configuration(format!(
                "Invalid principal name: {:?}",
                principal
            )));
        }

        let path = self.wallet_path(org_id, principal);
        let entry: WalletEntry = Self::read_json(&path).await?;

        if let Some(stored) = entry.msp_id.as_deref() {
            if stored != org_id {
                return Err(LedgerError::configuration(format!(
                    "Wallet entry for {} belongs to {}, not {}",
                    principal, stored, org_id
                )));
            }
        }

        Ok(Identity::new(
            org_id,
            principal,
            entry.credentials.certificate,
            entry.credentials.private_key,
        ))
    }
}
