//! Keyed serialisation
//!
//! A transition holds its pair's lock across the ledger call and the mirror
//! write, so two in-process transitions on one pair cannot interleave.
//! Document writes hold a per-patient lock across the ledger update and the
//! ciphertext write. Different keys never contend.
//!
//! Entries live only while someone holds or waits for them: the last guard
//! to drop removes its key from the map.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

use ehr_core::types::PairKey;

type LockMap<K> = Arc<StdMutex<HashMap<K, Arc<Mutex<()>>>>>;

/// Per-pair locks for status transitions
pub type PairLocks = KeyedLocks<PairKey>;

/// Per-patient locks for document writes
pub type PatientLocks = KeyedLocks<String>;

#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: LockMap<K>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }
}

// The map is only touched in short, non-async sections, so a poisoned
// mutex still holds a consistent map.
fn lock_map<K>(
    map: &StdMutex<HashMap<K, Arc<Mutex<()>>>>,
) -> MutexGuard<'_, HashMap<K, Arc<Mutex<()>>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`; released when the guard drops
    pub async fn acquire(&self, key: &K) -> KeyGuard<K> {
        let lock = lock_map(&self.locks).entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            key: key.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of keys currently held or awaited
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one key
pub struct KeyGuard<K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    locks: LockMap<K>,
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        // Release first so the map holds the only other reference when idle.
        self.guard.take();
        let mut locks = lock_map(&self.locks);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
