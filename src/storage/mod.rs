//! Persistent key-value storage areas
//!
//! Two areas mirror the host's persistent stores:
//! - **local**: device-only legacy area
//! - **sync**: area propagated between devices, preferred when present
//!
//! Every `set` replaces whole values (no server-side merging) and announces
//! each written key on the area's change channel.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::constants::config::{LOCAL_AREA_FILE, SYNC_AREA_FILE};

pub mod file;
pub mod memory;
pub mod snippets;

pub use file::JsonFileArea;
pub use memory::MemoryArea;
pub use snippets::{ItemError, ItemPatch, NewItem, SnippetItem, SnippetStore};

/// Key → value map read from or written to an area
pub type StorageValues = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaName {
    Local,
    Sync,
}

impl fmt::Display for AreaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaName::Local => f.write_str("local"),
            AreaName::Sync => f.write_str("sync"),
        }
    }
}

/// A single key written to an area
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: AreaName,
    pub key: String,
    pub new_value: Value,
}

#[async_trait]
pub trait StorageArea: Send + Sync {
    fn name(&self) -> AreaName;

    /// Values for the requested keys; keys never written are absent from the map
    async fn get(&self, keys: &[&str]) -> Result<StorageValues>;

    /// Write all given keys in one atomic step
    async fn set(&self, values: StorageValues) -> Result<()>;

    /// Receive every key written after this call
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// Announce written keys to subscribers (no subscribers is fine)
pub(crate) fn broadcast_changes(
    sender: &broadcast::Sender<StorageChange>,
    area: AreaName,
    values: &StorageValues,
) {
    for (key, new_value) in values {
        let change = StorageChange {
            area,
            key: key.clone(),
            new_value: new_value.clone(),
        };
        if sender.send(change).is_err() {
            debug!(area = %area, key = %key, "no storage change subscribers");
        }
    }
}

/// The legacy and synced areas available to this process
#[derive(Clone, Default)]
pub struct StorageAreas {
    pub local: Option<Arc<dyn StorageArea>>,
    pub sync: Option<Arc<dyn StorageArea>>,
}

impl StorageAreas {
    pub fn new(local: Option<Arc<dyn StorageArea>>, sync: Option<Arc<dyn StorageArea>>) -> Self {
        Self { local, sync }
    }

    /// File-backed areas under `data_dir`
    pub fn open(data_dir: &Path, sync_enabled: bool) -> Self {
        let local: Arc<dyn StorageArea> = Arc::new(JsonFileArea::new(
            AreaName::Local,
            data_dir.join(LOCAL_AREA_FILE),
        ));
        let sync = sync_enabled.then(|| {
            Arc::new(JsonFileArea::new(AreaName::Sync, data_dir.join(SYNC_AREA_FILE)))
                as Arc<dyn StorageArea>
        });
        Self::new(Some(local), sync)
    }

    /// The synced area when present, otherwise the local one
    pub fn default_area(&self) -> Result<Arc<dyn StorageArea>> {
        self.sync
            .clone()
            .or_else(|| self.local.clone())
            .ok_or_else(|| anyhow!("No available storage area found"))
    }

    /// One change receiver per available area
    pub fn subscribe_all(&self) -> Vec<broadcast::Receiver<StorageChange>> {
        [&self.local, &self.sync]
            .into_iter()
            .flatten()
            .map(|area| area.subscribe())
            .collect()
    }
}
