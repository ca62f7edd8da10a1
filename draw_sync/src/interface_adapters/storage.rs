// Key/value store adapters: in-memory, and a JSON file for state that outlives the process.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::errors::StoreError;
use crate::domain::ports::KeyValueStore;

#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut values = self.values.lock().await;
        Ok(values.remove(key).is_some())
    }
}

/// Write-through store persisted as one JSON object.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Loads `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError::Io(format!("invalid state file: {e}")))?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        debug!(path = %path.display(), keys = values.len(), "state file loaded");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let raw =
            serde_json::to_string_pretty(values).map_err(|e| StoreError::Io(e.to_string()))?;
        // Replace atomically so readers never see a half-written file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        if values.get(key).is_some_and(|current| current == value) {
            return Ok(());
        }
        values.insert(key.to_string(), value.to_string());
        self.persist(&values).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut values = self.values.lock().await;
        if values.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&values).await?;
        Ok(true)
    }
}
