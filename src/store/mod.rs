//==================================================
// File: store/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Cross-invocation persistence of learned bindings
// Objective: Snapshot type plus interchangeable key/value backends
//==================================================

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::fingerprint::Fingerprint;
use crate::trie::{Binding, PrefixBinding};

mod file;

pub use file::FileBindingStore;

//==================================================
// Section 1.0 - Snapshot
//==================================================

/// Everything a resolver learned, tagged with the configuration that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub fingerprint: Fingerprint,
    pub crate_version: String,
    pub created_at: DateTime<Utc>,
    pub base_paths: Vec<PathBuf>,
    pub bindings: Vec<PrefixBinding>,
    pub pseudo_bindings: BTreeMap<String, Binding>,
    /// Entries for single identifiers that overrule their prefix or group.
    pub identifier_bindings: BTreeMap<String, Binding>,
}

impl CacheSnapshot {
    pub fn new(fingerprint: Fingerprint, base_paths: Vec<PathBuf>) -> Self {
        Self {
            fingerprint,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            base_paths,
            bindings: Vec::new(),
            pseudo_bindings: BTreeMap::new(),
            identifier_bindings: BTreeMap::new(),
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len() + self.pseudo_bindings.len() + self.identifier_bindings.len()
    }

    /// Why this snapshot cannot be reused under `expected`, if it cannot.
    pub fn mismatch(&self, expected: Fingerprint, base_paths: &[PathBuf]) -> Option<String> {
        if self.crate_version != env!("CARGO_PKG_VERSION") {
            return Some(format!(
                "snapshot written by version {} (current {})",
                self.crate_version,
                env!("CARGO_PKG_VERSION")
            ));
        }
        if self.fingerprint != expected {
            return Some(format!(
                "configuration fingerprint changed from {} to {}",
                self.fingerprint, expected
            ));
        }
        if self.base_paths != base_paths {
            return Some("base path list changed".to_string());
        }
        None
    }
}

//==================================================
// Section 2.0 - Store backends
//==================================================

/// External key/value cache that survives process restarts.
///
/// Implementations must make `store` atomic from a reader's point of view.
/// Concurrent writers for one key may overwrite each other.
pub trait PersistentBindingStore: Send + Sync {
    fn load(&self, key: &str) -> StoreResult<Option<CacheSnapshot>>;
    fn store(&self, key: &str, snapshot: &CacheSnapshot) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Persistence switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

impl PersistentBindingStore for DisabledStore {
    fn load(&self, _key: &str) -> StoreResult<Option<CacheSnapshot>> {
        Ok(None)
    }

    fn store(&self, _key: &str, _snapshot: &CacheSnapshot) -> StoreResult<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }
}

/// In-process store, handy for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryBindingStore {
    entries: Mutex<HashMap<String, CacheSnapshot>>,
}

impl MemoryBindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl PersistentBindingStore for MemoryBindingStore {
    fn load(&self, key: &str) -> StoreResult<Option<CacheSnapshot>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn store(&self, key: &str, snapshot: &CacheSnapshot) -> StoreResult<()> {
        self.entries.lock().insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintFlags;
    use crate::pseudo::PseudoPrefixPolicy;

    fn fingerprint(paths: &[PathBuf]) -> Fingerprint {
        Fingerprint::compute(
            paths,
            &FingerprintFlags {
                include_env_paths: false,
                extension: "php".to_string(),
                separator: '\\',
                pseudo_prefix: PseudoPrefixPolicy::default(),
            },
        )
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryBindingStore::new();
        let paths = vec![PathBuf::from("/src")];
        let mut snapshot = CacheSnapshot::new(fingerprint(&paths), paths);
        snapshot.pseudo_bindings.insert("Zend".to_string(), Binding::Unresolvable);

        assert!(store.load("app").expect("load").is_none());
        store.store("app", &snapshot).expect("store");
        assert_eq!(store.load("app").expect("load"), Some(snapshot));
        store.remove("app").expect("remove");
        assert!(store.is_empty());
    }

    #[test]
    fn disabled_store_never_returns_data() {
        let store = DisabledStore;
        let paths = vec![PathBuf::from("/src")];
        let snapshot = CacheSnapshot::new(fingerprint(&paths), paths);
        store.store("app", &snapshot).expect("store");
        assert!(store.load("app").expect("load").is_none());
    }

    #[test]
    fn mismatch_detects_reordered_paths() {
        let c1 = vec![PathBuf::from("/src"), PathBuf::from("/vendor")];
        let c2 = vec![PathBuf::from("/vendor"), PathBuf::from("/src")];
        let snapshot = CacheSnapshot::new(fingerprint(&c1), c1.clone());
        assert!(snapshot.mismatch(fingerprint(&c1), &c1).is_none());
        let reason = snapshot.mismatch(fingerprint(&c2), &c2).expect("mismatch");
        assert!(reason.contains("fingerprint"));
    }
}
