//! JSON-file backed storage area
//!
//! The whole area lives in one JSON object on disk. Writes go to a sibling
//! temp file first and are renamed into place, so a crash never leaves a
//! half-written area behind.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use super::{AreaName, StorageArea, StorageChange, StorageValues, broadcast_changes};
use crate::constants::ipc::CHANGE_CHANNEL_CAPACITY;

pub struct JsonFileArea {
    name: AreaName,
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    io_lock: Mutex<()>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileArea {
    pub fn new(name: AreaName, path: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            name,
            path,
            io_lock: Mutex::new(()),
            changes,
        }
    }

    async fn read_all(&self) -> Result<StorageValues> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    area = %self.name,
                    path = %self.path.display(),
                    "storage file not found, area is empty"
                );
                return Ok(StorageValues::new());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to read {}", self.path.display()));
            }
        };

        if contents.trim().is_empty() {
            return Ok(StorageValues::new());
        }

        match serde_json::from_str::<Value>(&contents)
            .context(format!("Failed to parse {}", self.path.display()))?
        {
            Value::Object(values) => Ok(values),
            _ => bail!("Storage file {} does not contain a JSON object", self.path.display()),
        }
    }

    async fn write_all(&self, values: &StorageValues) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create storage directory: {}", parent.display()))?;
        }

        let json =
            serde_json::to_string_pretty(values).context("Failed to serialize storage area")?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .context(format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .context(format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl StorageArea for JsonFileArea {
    fn name(&self) -> AreaName {
        self.name
    }

    async fn get(&self, keys: &[&str]) -> Result<StorageValues> {
        let _guard = self.io_lock.lock().await;
        let mut stored = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|key| stored.remove(*key).map(|value| (key.to_string(), value)))
            .collect())
    }

    async fn set(&self, values: StorageValues) -> Result<()> {
        {
            let _guard = self.io_lock.lock().await;
            let mut stored = self.read_all().await?;
            for (key, value) in &values {
                stored.insert(key.clone(), value.clone());
            }
            self.write_all(&stored).await?;
        }
        broadcast_changes(&self.changes, self.name, &values);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(raw: Value) -> StorageValues {
        raw.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let area = JsonFileArea::new(AreaName::Local, dir.path().join("local.json"));

        let stored = area.get(&["snippetItems"]).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_set_merges_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/sync.json");
        let area = JsonFileArea::new(AreaName::Sync, path.clone());

        area.set(values(json!({ "a": 1, "b": [1, 2] }))).await.unwrap();
        area.set(values(json!({ "b": null }))).await.unwrap();

        let reopened = JsonFileArea::new(AreaName::Sync, path.clone());
        let stored = reopened.get(&["a", "b"]).await.unwrap();
        assert_eq!(stored.get("a"), Some(&json!(1)));
        assert_eq!(stored.get("b"), Some(&Value::Null));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_set_notifies_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let area = JsonFileArea::new(AreaName::Local, dir.path().join("local.json"));
        let mut rx = area.subscribe();

        area.set(values(json!({ "displayMode": "window" }))).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.area, AreaName::Local);
        assert_eq!(change.key, "displayMode");
        assert_eq!(change.new_value, json!("window"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "{ not json").unwrap();
        let area = JsonFileArea::new(AreaName::Local, path.clone());

        assert!(area.get(&["a"]).await.is_err());
        assert!(area.set(values(json!({ "a": 1 }))).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_non_object_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let area = JsonFileArea::new(AreaName::Local, path);

        let err = area.get(&["a"]).await.unwrap_err();
        assert!(err.to_string().contains("does not contain a JSON object"));
    }
}
