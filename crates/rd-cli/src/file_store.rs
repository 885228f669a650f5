//! JSON file backends standing in for the browser storage areas.
//!
//! A store directory holds `sync.json` and `local.json`, each a single JSON
//! object mapping keys to values. A missing file is an empty area.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use rd_core::config::StorageConfig;
use rd_core::error::StoreError;
use rd_core::store::{KeyValueStore, StorageProvider};

pub const SYNC_FILE: &str = "sync.json";
pub const LOCAL_FILE: &str = "local.json";

pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&text).map_err(|source| StoreError::Malformed {
            key: self.path.display().to_string(),
            source,
        })
    }

    async fn save(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let text = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Malformed {
            key: self.path.display().to_string(),
            source,
        })?;

        // Write then rename so readers never see a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        Ok(entries.remove(key))
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.save(&entries).await
    }
}

/// Provider over `<dir>/sync.json` and `<dir>/local.json`.
pub fn open_provider(dir: &Path, config: &StorageConfig) -> StorageProvider {
    let sync = Arc::new(JsonFileStore::new(dir.join(SYNC_FILE)));
    let local = Arc::new(JsonFileStore::new(dir.join(LOCAL_FILE)));
    StorageProvider::new(sync, local).with_default_mode(config.default_mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rd_core::store::{RuleStore, STORAGE_MODE_KEY};
    use rd_core::types::{RuleSet, StorageMode};
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("none.json"));
        assert_eq!(store.read("rules").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/local.json"));

        store.write("rules", json!([])).await.unwrap();
        store.write("other", json!(3)).await.unwrap();

        assert_eq!(store.read("rules").await.unwrap(), Some(json!([])));
        assert_eq!(store.read("other").await.unwrap(), Some(json!(3)));
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(matches!(store.read("rules").await, Err(StoreError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_provider_reads_selected_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SYNC_FILE),
            r#"{"rules":[{"id":1,"pattern":"*","redirect":"https://b.com","enabled":true}]}"#,
        )
        .unwrap();

        let provider = open_provider(dir.path(), &StorageConfig::default());
        assert_eq!(provider.load_rules().await.unwrap(), None);

        JsonFileStore::new(dir.path().join(LOCAL_FILE))
            .write(STORAGE_MODE_KEY, json!("sync"))
            .await
            .unwrap();
        assert_eq!(provider.mode().await.unwrap(), StorageMode::Sync);
        assert_eq!(provider.load_rules().await.unwrap().map(|r| r.len()), Some(1));

        provider.save_rules(&RuleSet::new()).await.unwrap();
        let text = std::fs::read_to_string(dir.path().join(SYNC_FILE)).unwrap();
        let saved: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(saved["rules"], json!([]));
    }
}
