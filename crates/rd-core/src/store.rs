//! Rule storage glue
//!
//! The browser offers two interchangeable key-value areas: one synchronized
//! across the user's browsers and one local to the profile. A flag in the
//! local area says which one currently holds the rules. [`StorageProvider`]
//! resolves that flag once per logical operation and hands back the backend
//! to use for the whole operation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{Rule, RuleSet, StorageMode};

/// Key holding the persisted RuleSet.
pub const RULES_KEY: &str = "rules";

/// Key holding the storage-mode flag (always in the local area).
pub const STORAGE_MODE_KEY: &str = "storageMode";

// =============================================================================
// Key-Value Backends
// =============================================================================

/// Async key-value namespace backed by JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read `key`. `None` when the key has never been written.
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write `value` under `key`.
    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// In-memory store (tests and embedding).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a rule set.
    pub fn with_rules(rules: &RuleSet) -> Self {
        let mut entries = HashMap::new();
        // RuleSet always serializes to an array.
        entries.insert(
            RULES_KEY.to_string(),
            serde_json::to_value(rules).unwrap_or(Value::Array(Vec::new())),
        );
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

// =============================================================================
// Rule Store
// =============================================================================

/// Typed access to the persisted RuleSet.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Read one consistent snapshot. `None` when no rule list has ever been
    /// written, which is distinct from an empty list.
    async fn load_rules(&self) -> Result<Option<RuleSet>, StoreError>;

    /// Replace the persisted RuleSet.
    async fn save_rules(&self, rules: &RuleSet) -> Result<(), StoreError>;
}

/// Decode a persisted rule list record by record.
///
/// The value must be an array. A record that fails to decode, or that reuses
/// an id already seen, is dropped with a warning; the remaining rules keep
/// their stored order.
pub fn decode_rules(value: Value) -> Result<RuleSet, StoreError> {
    let records: Vec<Value> = serde_json::from_value(value).map_err(|source| StoreError::Malformed {
        key: RULES_KEY.to_string(),
        source,
    })?;

    let mut rules = RuleSet::new();
    for (index, record) in records.into_iter().enumerate() {
        let rule = match serde_json::from_value::<Rule>(record) {
            Ok(rule) => rule,
            Err(e) => {
                warn!("rule record {index} skipped: {e}");
                continue;
            }
        };
        if let Err(e) = rules.push(rule) {
            warn!("rule record {index} skipped: {e}");
        }
    }
    Ok(rules)
}

/// Read and decode the RuleSet from one backend.
pub async fn read_rules(store: &dyn KeyValueStore) -> Result<Option<RuleSet>, StoreError> {
    match store.read(RULES_KEY).await? {
        Some(value) => decode_rules(value).map(Some),
        None => Ok(None),
    }
}

/// Encode and write the RuleSet to one backend.
pub async fn write_rules(store: &dyn KeyValueStore, rules: &RuleSet) -> Result<(), StoreError> {
    let value = serde_json::to_value(rules).map_err(|source| StoreError::Malformed {
        key: RULES_KEY.to_string(),
        source,
    })?;
    store.write(RULES_KEY, value).await
}

// =============================================================================
// Storage Provider
// =============================================================================

/// Owns both backends and picks the current one per operation.
#[derive(Clone)]
pub struct StorageProvider {
    sync: Arc<dyn KeyValueStore>,
    local: Arc<dyn KeyValueStore>,
    default_mode: StorageMode,
}

impl StorageProvider {
    pub fn new(sync: Arc<dyn KeyValueStore>, local: Arc<dyn KeyValueStore>) -> Self {
        Self {
            sync,
            local,
            default_mode: StorageMode::default(),
        }
    }

    /// Provider over a single backend used for both modes.
    pub fn single(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(Arc::clone(&store), store)
    }

    /// Mode used when no flag has been persisted.
    pub fn with_default_mode(mut self, mode: StorageMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Read the persisted storage-mode flag.
    pub async fn mode(&self) -> Result<StorageMode, StoreError> {
        match self.local.read(STORAGE_MODE_KEY).await? {
            Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Malformed {
                key: STORAGE_MODE_KEY.to_string(),
                source,
            }),
            None => Ok(self.default_mode),
        }
    }

    /// Persist the storage-mode flag.
    pub async fn set_mode(&self, mode: StorageMode) -> Result<(), StoreError> {
        let value = serde_json::to_value(mode).map_err(|source| StoreError::Malformed {
            key: STORAGE_MODE_KEY.to_string(),
            source,
        })?;
        self.local.write(STORAGE_MODE_KEY, value).await
    }

    pub fn backend(&self, mode: StorageMode) -> &dyn KeyValueStore {
        match mode {
            StorageMode::Sync => self.sync.as_ref(),
            StorageMode::Local => self.local.as_ref(),
        }
    }

    /// Resolve the current backend. Call once per logical operation.
    pub async fn select(&self) -> Result<&dyn KeyValueStore, StoreError> {
        let mode = self.mode().await?;
        debug!("storage mode: {mode:?}");
        Ok(self.backend(mode))
    }
}

#[async_trait]
impl RuleStore for StorageProvider {
    async fn load_rules(&self) -> Result<Option<RuleSet>, StoreError> {
        let store = self.select().await?;
        read_rules(store).await
    }

    async fn save_rules(&self, rules: &RuleSet) -> Result<(), StoreError> {
        let store = self.select().await?;
        write_rules(store, rules).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_rules() -> RuleSet {
        let mut rules = RuleSet::new();
        rules.add("https://a.com", "https://b.com").unwrap();
        rules
    }

    #[tokio::test]
    async fn test_memory_store_read_write() {
        let store = MemoryStore::new();
        assert!(store.read("missing").await.unwrap().is_none());
        store.write("k", json!([1, 2])).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_absent_and_empty_are_distinct() {
        let store = MemoryStore::new();
        assert_eq!(read_rules(&store).await.unwrap(), None);

        write_rules(&store, &RuleSet::new()).await.unwrap();
        assert_eq!(read_rules(&store).await.unwrap(), Some(RuleSet::new()));
    }

    #[tokio::test]
    async fn test_malformed_rules() {
        let store = MemoryStore::new();
        store.write(RULES_KEY, json!({"not": "a list"})).await.unwrap();
        let err = read_rules(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_bad_records_are_dropped_individually() {
        let store = MemoryStore::new();
        store
            .write(
                RULES_KEY,
                json!([
                    {"id": 1, "pattern": "https://a.com", "redirect": "https://b.com", "enabled": true},
                    {"id": 2, "pattern": "https://c.com", "redirect": "https://d.com"},
                    "not a rule",
                    {"id": 1, "pattern": "https://e.com", "redirect": "https://f.com", "enabled": true},
                    {"id": 5, "pattern": "*", "redirect": "https://g.com", "enabled": false}
                ]),
            )
            .await
            .unwrap();

        let rules = read_rules(&store).await.unwrap().unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 5]);
        assert_eq!(rules.get(1).unwrap().pattern, "https://a.com");
    }

    #[test]
    fn test_decode_all_bad_records_is_empty_not_absent() {
        let rules = decode_rules(json!([{"id": "x"}, null])).unwrap();
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn test_provider_defaults_to_local() {
        let sync = Arc::new(MemoryStore::new());
        let local = Arc::new(MemoryStore::with_rules(&sample_rules()));
        let provider = StorageProvider::new(sync, local);

        assert_eq!(provider.mode().await.unwrap(), StorageMode::Local);
        assert_eq!(provider.load_rules().await.unwrap(), Some(sample_rules()));
    }

    #[tokio::test]
    async fn test_provider_follows_mode_flag() {
        let sync = Arc::new(MemoryStore::with_rules(&sample_rules()));
        let local = Arc::new(MemoryStore::new());
        let provider = StorageProvider::new(sync.clone(), local.clone());

        assert_eq!(provider.load_rules().await.unwrap(), None);

        provider.set_mode(StorageMode::Sync).await.unwrap();
        assert_eq!(local.read(STORAGE_MODE_KEY).await.unwrap(), Some(json!("sync")));
        assert_eq!(provider.load_rules().await.unwrap(), Some(sample_rules()));

        provider.save_rules(&RuleSet::new()).await.unwrap();
        assert_eq!(read_rules(&*sync).await.unwrap(), Some(RuleSet::new()));
        assert_eq!(read_rules(&*local).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_default_mode_override() {
        let sync = Arc::new(MemoryStore::with_rules(&sample_rules()));
        let provider =
            StorageProvider::new(sync, Arc::new(MemoryStore::new())).with_default_mode(StorageMode::Sync);
        assert_eq!(provider.load_rules().await.unwrap(), Some(sample_rules()));
    }

    #[tokio::test]
    async fn test_malformed_mode_flag() {
        let local = Arc::new(MemoryStore::new());
        local.write(STORAGE_MODE_KEY, json!("cloud")).await.unwrap();
        let provider = StorageProvider::single(local);
        assert!(matches!(provider.mode().await, Err(StoreError::Malformed { .. })));
        assert!(provider.load_rules().await.is_err());
    }
}
