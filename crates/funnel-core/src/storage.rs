//! Local persistence adapter
//!
//! Namespaced key-value storage of JSON records, standing in for the
//! browser's local storage. Components depend on [`Persistence`] and a
//! [`KeyValueStore`] backend instead of a global, so tests can inject
//! in-memory fakes that simulate quota and private-browsing failures.
//!
//! Writes are soft: a failed save is logged and reported as `false`,
//! never raised. Reads collapse every failure into "absent".

use crate::error::StorageError;
use crate::types::{CandidateRecord, EpiSelection, PaymentInfo, PayoutAccount};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Raw string storage backend
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Read raw value
    ///
    /// # Errors
    /// Backend unavailable or unreadable
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write raw value, replacing any prior one
    ///
    /// # Errors
    /// Backend unavailable or over quota
    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove value; succeeds when absent
    ///
    /// # Errors
    /// Backend unavailable
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed storage key
///
/// Ties a key name to the record type stored under it.
pub struct StorageKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StorageKey<T> {
    /// Declare a key
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Key name
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StorageKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StorageKey<T> {}

impl<T> fmt::Debug for StorageKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageKey").field(&self.name).finish()
    }
}

/// Keys used by the wizard
pub mod keys {
    use super::StorageKey;
    use crate::types::{CandidateRecord, EpiSelection, PaymentInfo, PayoutAccount};

    /// Accumulated candidate profile
    pub const CANDIDATE: StorageKey<CandidateRecord> = StorageKey::new("candidate_data");
    /// Safety kit sizes
    pub const EPI: StorageKey<EpiSelection> = StorageKey::new("epi_data");
    /// Payout account
    pub const PAYOUT: StorageKey<PayoutAccount> = StorageKey::new("payout_data");
    /// Last generated payment
    pub const PAYMENT: StorageKey<PaymentInfo> = StorageKey::new("payment_data");
}

/// Namespaced, typed view over a [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl Persistence {
    /// Create adapter over a backend
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// In-memory adapter without quota
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), "funnel")
    }

    fn full_key(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.namespace, key)
        }
    }

    /// Serialize and store a record
    ///
    /// Returns `false` on failure; the caller carries on without
    /// guaranteed persistence.
    pub fn save<T: Serialize>(&self, key: StorageKey<T>, record: &T) -> bool {
        let text = match serde_json::to_string(record) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to serialize {}: {}", key.name(), e);
                return false;
            }
        };

        match self.store.set_raw(&self.full_key(key.name()), text) {
            Ok(()) => {
                tracing::debug!("Saved {}", key.name());
                true
            }
            Err(e) => {
                tracing::warn!("Soft failure saving {}: {}", key.name(), e);
                false
            }
        }
    }

    /// Load a record; absent when unwritten, malformed or unavailable
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, key: StorageKey<T>) -> Option<T> {
        let raw = match self.store.get_raw(&self.full_key(key.name())) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::debug!("Storage unavailable reading {}: {}", key.name(), e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding malformed {}: {}", key.name(), e);
                None
            }
        }
    }

    /// Remove a record; idempotent
    pub fn clear<T>(&self, key: StorageKey<T>) {
        if let Err(e) = self.store.remove(&self.full_key(key.name())) {
            tracing::warn!("Failed to clear {}: {}", key.name(), e);
        }
    }

    /// Remove every wizard record
    pub fn clear_all(&self) {
        self.clear(keys::CANDIDATE);
        self.clear(keys::EPI);
        self.clear(keys::PAYOUT);
        self.clear(keys::PAYMENT);
    }

    /// Stored candidate, if any
    #[inline]
    #[must_use]
    pub fn candidate(&self) -> Option<CandidateRecord> {
        self.load(keys::CANDIDATE)
    }

    /// Stored kit selection, if any
    #[inline]
    #[must_use]
    pub fn epi(&self) -> Option<EpiSelection> {
        self.load(keys::EPI)
    }

    /// Stored payout account, if any
    #[inline]
    #[must_use]
    pub fn payout(&self) -> Option<PayoutAccount> {
        self.load(keys::PAYOUT)
    }

    /// Stored payment, if any
    #[inline]
    #[must_use]
    pub fn payment(&self) -> Option<PaymentInfo> {
        self.load(keys::PAYMENT)
    }
}

/// In-memory backend with optional byte quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    unavailable: bool,
}

impl MemoryStore {
    /// Create unlimited store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store that rejects writes beyond `bytes` in total
    #[inline]
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Create store that fails every call, like private browsing
    #[inline]
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Put raw text directly, bypassing serialization
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable {
            Err(StorageError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.check_available()?;
        let mut entries = self.entries.write();

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            if used + needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    bytes: needed,
                });
            }
        }

        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Directory backend: one `<key>.json` file per entry
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open store rooted at `root`, creating the directory
    ///
    /// # Errors
    /// Directory cannot be created
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KitSize, Municipality};

    fn record() -> CandidateRecord {
        CandidateRecord {
            full_name: "Jane Doe".to_string(),
            tax_id: "12345678909".to_string(),
            selected_municipalities: vec![Municipality::new("Santos", 41)],
            ..CandidateRecord::default()
        }
    }

    #[test]
    fn save_then_load() {
        let persistence = Persistence::in_memory();
        assert!(persistence.save(keys::CANDIDATE, &record()));
        assert_eq!(persistence.candidate(), Some(record()));
    }

    #[test]
    fn save_overwrites() {
        let persistence = Persistence::in_memory();
        persistence.save(keys::CANDIDATE, &record());
        let mut updated = record();
        updated.city = "Santos".to_string();
        persistence.save(keys::CANDIDATE, &updated);
        assert_eq!(persistence.candidate().unwrap().city, "Santos");
    }

    #[test]
    fn load_absent_when_never_written() {
        let persistence = Persistence::in_memory();
        assert!(persistence.epi().is_none());
    }

    #[test]
    fn load_absent_when_malformed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_raw("funnel:candidate_data", "{not json");
        let persistence = Persistence::new(store, "funnel");
        assert!(persistence.candidate().is_none());
    }

    #[test]
    fn unavailable_store_is_soft() {
        let persistence = Persistence::new(Arc::new(MemoryStore::unavailable()), "funnel");
        assert!(!persistence.save(keys::CANDIDATE, &record()));
        assert!(persistence.candidate().is_none());
        persistence.clear(keys::CANDIDATE);
    }

    #[test]
    fn quota_failure_is_soft() {
        let persistence = Persistence::new(Arc::new(MemoryStore::with_quota(16)), "funnel");
        assert!(!persistence.save(keys::CANDIDATE, &record()));
        assert!(persistence.candidate().is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let persistence = Persistence::in_memory();
        persistence.save(
            keys::EPI,
            &EpiSelection {
                vest_size: KitSize::M,
                glove_size: KitSize::G,
                shoe_size: 41,
            },
        );
        persistence.clear(keys::EPI);
        persistence.clear(keys::EPI);
        assert!(persistence.epi().is_none());
    }

    #[test]
    fn namespaces_are_isolated() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = Persistence::new(store.clone(), "a");
        let b = Persistence::new(store, "b");
        a.save(keys::CANDIDATE, &record());
        assert!(b.candidate().is_none());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let persistence = Persistence::new(Arc::new(store), "funnel");

        assert!(persistence.save(keys::CANDIDATE, &record()));
        assert_eq!(persistence.candidate(), Some(record()));

        persistence.clear(keys::CANDIDATE);
        persistence.clear(keys::CANDIDATE);
        assert!(persistence.candidate().is_none());
    }
}
