//! Store Configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Where local state lives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Sled directory; in-memory when unset
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Load from `EHR_STORE_PATH`
    pub fn from_env() -> Self {
        Self {
            path: env::var("EHR_STORE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }
}
