//! In-process storage area

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};

use super::{AreaName, StorageArea, StorageChange, StorageValues, broadcast_changes};
use crate::constants::ipc::CHANGE_CHANNEL_CAPACITY;

pub struct MemoryArea {
    name: AreaName,
    values: Mutex<StorageValues>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryArea {
    pub fn new(name: AreaName) -> Self {
        Self::with_values(name, StorageValues::new())
    }

    pub fn with_values(name: AreaName, values: StorageValues) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            name,
            values: Mutex::new(values),
            changes,
        }
    }

    /// Seed from a JSON object literal; non-objects seed nothing
    pub fn from_json(name: AreaName, values: Value) -> Self {
        match values {
            Value::Object(map) => Self::with_values(name, map),
            _ => Self::new(name),
        }
    }

    /// Copy of everything stored
    pub async fn snapshot(&self) -> StorageValues {
        self.values.lock().await.clone()
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    fn name(&self) -> AreaName {
        self.name
    }

    async fn get(&self, keys: &[&str]) -> Result<StorageValues> {
        let values = self.values.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, values: StorageValues) -> Result<()> {
        {
            let mut stored = self.values.lock().await;
            for (key, value) in &values {
                stored.insert(key.clone(), value.clone());
            }
        }
        broadcast_changes(&self.changes, self.name, &values);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
