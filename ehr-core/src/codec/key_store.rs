//! Key Provider Abstraction
//!
//! The record codec never owns a compiled-in key. Key material is obtained
//! from a [`KeyProvider`], which lets deployments plug in:
//! - a key injected from configuration ([`StaticKeyProvider`])
//! - a development provider deriving keys from their reference ([`LocalKeyProvider`])
//! - an external KMS (implemented outside this crate)
//!
//! # Usage
//!
//! ```ignore
//! let provider = StaticKeyProvider::from_hex("ehr:v1", &hex_key)?;
//! let codec = RecordCodec::from_key_provider(&provider, "ehr:v1").await?;
//! ```

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use zeroize::Zeroize;

use crate::error::CoreError;

/// ChaCha20-Poly1305 key size (256 bits)
pub const KEY_SIZE: usize = 32;

/// Key material wrapper that zeroizes on drop
#[derive(Clone)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse hex-encoded key material
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyProviderError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| KeyProviderError::Invalid(format!("Invalid hex: {}", e)))?;
        if bytes.len() != KEY_SIZE {
            return Err(KeyProviderError::Invalid(format!(
                "Invalid key length: expected {}, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Get key bytes (use with caution)
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial([REDACTED {} bytes])", self.0.len())
    }
}

/// Error type for KeyProvider operations
#[derive(Debug, Clone)]
pub enum KeyProviderError {
    /// Key not found
    NotFound(String),
    /// Key material malformed
    Invalid(String),
    /// Provider backend unreachable
    Unavailable(String),
}

impl std::fmt::Display for KeyProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Key not found: {}", msg),
            Self::Invalid(msg) => write!(f, "Invalid key: {}", msg),
            Self::Unavailable(msg) => write!(f, "Key provider unavailable: {}", msg),
        }
    }
}

impl std::error::Error for KeyProviderError {}

impl From<KeyProviderError> for CoreError {
    fn from(err: KeyProviderError) -> Self {
        CoreError::KeyManagement(err.to_string())
    }
}

/// Source of record encryption keys
///
/// Implementations must never log raw key material.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Get the key for a reference
    async fn get_key(&self, key_ref: &str) -> Result<KeyMaterial, KeyProviderError>;

    /// Check whether a key reference resolves
    async fn key_exists(&self, key_ref: &str) -> bool {
        self.get_key(key_ref).await.is_ok()
    }
}

/// Keys injected at startup (typically from configuration)
#[derive(Default)]
pub struct StaticKeyProvider {
    keys: HashMap<String, KeyMaterial>,
}

impl StaticKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider holding a single hex-encoded key
    pub fn from_hex(key_ref: &str, hex_key: &str) -> Result<Self, KeyProviderError> {
        let mut provider = Self::new();
        provider.insert(key_ref, KeyMaterial::from_hex(hex_key)?)?;
        Ok(provider)
    }

    /// Add a key
    pub fn insert(&mut self, key_ref: &str, material: KeyMaterial) -> Result<(), KeyProviderError> {
        if material.len() != KEY_SIZE {
            return Err(KeyProviderError::Invalid(format!(
                "Key '{}' must be {} bytes, got {}",
                key_ref,
                KEY_SIZE,
                material.len()
            )));
        }
        self.keys.insert(key_ref.to_string(), material);
        Ok(())
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_key(&self, key_ref: &str) -> Result<KeyMaterial, KeyProviderError> {
        self.keys
            .get(key_ref)
            .cloned()
            .ok_or_else(|| KeyProviderError::NotFound(key_ref.to_string()))
    }
}

/// Development key provider
///
/// # WARNING
/// Keys are derived from the reference and a salt with SHA-256. Anyone who
/// knows both can recompute the key. Do not use in production.
pub struct LocalKeyProvider {
    salt: Vec<u8>,
}

impl LocalKeyProvider {
    pub fn new() -> Self {
        Self {
            salt: b"ehr-local-dev-salt-v1".to_vec(),
        }
    }

    pub fn with_salt(salt: Vec<u8>) -> Self {
        Self { salt }
    }

    fn derive_key(&self, key_ref: &str) -> KeyMaterial {
        let mut hasher = Sha256::new();
        hasher.update(&self.salt);
        hasher.update(key_ref.as_bytes());
        hasher.update(b"ehr-local-record-key");
        KeyMaterial::new(hasher.finalize().to_vec())
    }
}

impl Default for LocalKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyProvider for LocalKeyProvider {
    async fn get_key(&self, key_ref: &str) -> Result<KeyMaterial, KeyProviderError> {
        tracing::warn!(key_ref = %key_ref, "Deriving record key with insecure local provider");
        Ok(self.derive_key(key_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_key_material_debug_is_redacted() {
        let key = KeyMaterial::from_hex(HEX_KEY).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("0102"));
    }

    #[test]
    fn test_key_material_rejects_short_keys() {
        assert!(matches!(
            KeyMaterial::from_hex("abcd"),
            Err(KeyProviderError::Invalid(_))
        ));
        assert!(KeyMaterial::from_hex("not hex").is_err());
    }

    #[tokio::test]
    async fn test_static_provider_lookup() {
        let provider = StaticKeyProvider::from_hex("ehr:v1", HEX_KEY).unwrap();
        let key = provider.get_key("ehr:v1").await.unwrap();
        assert_eq!(key.len(), KEY_SIZE);
        assert!(provider.key_exists("ehr:v1").await);
        assert!(matches!(
            provider.get_key("ehr:v2").await,
            Err(KeyProviderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_provider_is_deterministic_per_ref() {
        let provider = LocalKeyProvider::new();
        let a = provider.get_key("ehr:v1").await.unwrap();
        let b = provider.get_key("ehr:v1").await.unwrap();
        let c = provider.get_key("ehr:v2").await.unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }
}
