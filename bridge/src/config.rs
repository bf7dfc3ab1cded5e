//! Bridge Configuration

use serde::{Deserialize, Serialize};
use std::env;

use ehr_core::{CoreError, KeyProvider, LocalKeyProvider, RecordCodec, StaticKeyProvider};

use crate::error::BridgeResult;

const DEFAULT_KEY_REF: &str = "ehr:v1";

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Where the EHR contract lives and how reads are checked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub channel: String,
    pub contract: String,
    /// Compare decrypted content with the ledger hash before returning it
    pub enforce_integrity: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: "mychannel".to_string(),
            contract: "ehr".to_string(),
            enforce_integrity: true,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - EHR_BRIDGE_CHANNEL
    /// - EHR_BRIDGE_CONTRACT
    /// - EHR_BRIDGE_ENFORCE_INTEGRITY: "false" to skip the read-side hash check
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            channel: env::var("EHR_BRIDGE_CHANNEL").unwrap_or(defaults.channel),
            contract: env::var("EHR_BRIDGE_CONTRACT").unwrap_or(defaults.contract),
            enforce_integrity: env_flag("EHR_BRIDGE_ENFORCE_INTEGRITY")
                .unwrap_or(defaults.enforce_integrity),
        }
    }
}

/// Record encryption key settings
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Hex-encoded 32-byte key; a derived development key is used when unset
    pub key_hex: Option<String>,
    pub key_ref: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_hex: None,
            key_ref: DEFAULT_KEY_REF.to_string(),
        }
    }
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("key_hex", &self.key_hex.as_ref().map(|_| "[REDACTED]"))
            .field("key_ref", &self.key_ref)
            .finish()
    }
}

impl KeyConfig {
    /// Load from EHR_ENCRYPTION_KEY and EHR_ENCRYPTION_KEY_REF
    pub fn from_env() -> Self {
        Self {
            key_hex: env::var("EHR_ENCRYPTION_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            key_ref: env::var("EHR_ENCRYPTION_KEY_REF")
                .unwrap_or_else(|_| DEFAULT_KEY_REF.to_string()),
        }
    }

    pub fn is_development(&self) -> bool {
        self.key_hex.is_none()
    }

    /// Build the record codec this configuration describes
    pub async fn codec(&self) -> BridgeResult<RecordCodec> {
        let provider: Box<dyn KeyProvider> = match &self.key_hex {
            Some(hex_key) => Box::new(
                StaticKeyProvider::from_hex(&self.key_ref, hex_key.trim()).map_err(CoreError::from)?,
            ),
            None => Box::new(LocalKeyProvider::new()),
        };
        Ok(RecordCodec::from_key_provider(provider.as_ref(), &self.key_ref).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use ehr_core::EhrDocument;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_bridge_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.channel, "mychannel");
        assert_eq!(config.contract, "ehr");
        assert!(config.enforce_integrity);
    }

    #[tokio::test]
    async fn test_configured_key_builds_codec() {
        let config = KeyConfig {
            key_hex: Some(HEX_KEY.to_string()),
            key_ref: "ehr:test".to_string(),
        };
        assert!(!config.is_development());
        let codec = config.codec().await.unwrap();
        assert_eq!(codec.key_ref(), "ehr:test");

        let doc = EhrDocument {
            diagnosis: "flu".into(),
            ..EhrDocument::empty()
        };
        let sealed = codec.encrypt_document(&doc).unwrap();
        assert_eq!(codec.decrypt_document(&sealed).unwrap(), doc);
    }

    #[tokio::test]
    async fn test_development_key_is_stable() {
        let config = KeyConfig::default();
        assert!(config.is_development());
        let a = config.codec().await.unwrap();
        let b = config.codec().await.unwrap();
        let sealed = a.encrypt(b"note").unwrap();
        assert_eq!(b.decrypt(&sealed).unwrap(), b"note");
    }

    #[tokio::test]
    async fn test_short_key_rejected() {
        let config = KeyConfig {
            key_hex: Some("0011".to_string()),
            ..KeyConfig::default()
        };
        let err = config.codec().await.unwrap_err();
        assert!(matches!(err, BridgeError::Codec(_)));
    }

    #[test]
    fn test_key_debug_redacted() {
        let config = KeyConfig {
            key_hex: Some(HEX_KEY.to_string()),
            ..KeyConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("0102"));
        assert!(debug.contains("REDACTED"));
    }
}
