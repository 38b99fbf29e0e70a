//! One-shot copy of legacy (local) data into the synced area
//!
//! Runs at every process start and before every shortcut command. It only
//! ever copies into an empty synced area, so once it has run (or once the
//! user has real synced data) every later call is a no-op.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bindings::ShortcutBindings;
use crate::constants::storage_keys;
use crate::display_mode::DisplayMode;
use crate::storage::snippets::{normalize_last_used, raw_items};
use crate::storage::{StorageArea, StorageAreas, StorageValues};

/// Normalized view of the four application keys in one area
#[derive(Debug, Clone, PartialEq)]
struct AreaSnapshot {
    items: Vec<Value>,
    last_used_item_id: Option<String>,
    bindings: ShortcutBindings,
    display_mode: DisplayMode,
}

impl AreaSnapshot {
    async fn read(area: &dyn StorageArea) -> Result<Self> {
        let values = area.get(&storage_keys::ALL).await?;
        let field = |key: &str| values.get(key).cloned().unwrap_or(Value::Null);

        Ok(Self {
            items: raw_items(&field(storage_keys::ITEMS)),
            last_used_item_id: normalize_last_used(&field(storage_keys::LAST_USED_ITEM_ID)),
            bindings: ShortcutBindings::normalize(&field(storage_keys::SHORTCUT_BINDINGS)),
            display_mode: DisplayMode::normalize(&field(storage_keys::DISPLAY_MODE)),
        })
    }

    /// No user data worth keeping (the display mode alone does not count)
    fn is_empty(&self) -> bool {
        self.items.is_empty() && self.last_used_item_id.is_none() && self.bindings.is_empty()
    }

    fn into_values(self) -> StorageValues {
        let mut values = StorageValues::new();
        values.insert(storage_keys::ITEMS.to_string(), Value::Array(self.items));
        values.insert(
            storage_keys::LAST_USED_ITEM_ID.to_string(),
            self.last_used_item_id.map(Value::String).unwrap_or(Value::Null),
        );
        values.insert(storage_keys::SHORTCUT_BINDINGS.to_string(), self.bindings.to_value());
        values.insert(
            storage_keys::DISPLAY_MODE.to_string(),
            Value::String(self.display_mode.as_str().to_string()),
        );
        values
    }
}

#[derive(Clone)]
pub struct StorageMigrator {
    legacy: Option<Arc<dyn StorageArea>>,
    synced: Option<Arc<dyn StorageArea>>,
}

impl StorageMigrator {
    pub fn new(areas: &StorageAreas) -> Self {
        Self {
            legacy: areas.local.clone(),
            synced: areas.sync.clone(),
        }
    }

    /// Copy legacy data into the synced area if, and only if, that is safe
    ///
    /// Returns `true` when a copy was written. Preconditions are checked in
    /// order and the first failing one ends the call without writing:
    /// 1. both areas exist and are distinct
    /// 2. the synced area holds no items, last-used id or bindings
    /// 3. the legacy area holds at least one of those
    pub async fn migrate(&self) -> Result<bool> {
        let (Some(legacy), Some(synced)) = (&self.legacy, &self.synced) else {
            debug!("migration skipped: legacy or synced area unavailable");
            return Ok(false);
        };
        if Arc::ptr_eq(legacy, synced) {
            debug!("migration skipped: legacy and synced area are the same");
            return Ok(false);
        }

        let synced_snapshot = AreaSnapshot::read(synced.as_ref()).await?;
        if !synced_snapshot.is_empty() {
            debug!("migration skipped: synced area already has data");
            return Ok(false);
        }

        let legacy_snapshot = AreaSnapshot::read(legacy.as_ref()).await?;
        if legacy_snapshot.is_empty() {
            debug!("migration skipped: nothing to migrate");
            return Ok(false);
        }

        info!(
            items = legacy_snapshot.items.len(),
            bindings = legacy_snapshot.bindings.len(),
            display_mode = %legacy_snapshot.display_mode,
            "Migrating legacy storage into synced area"
        );
        synced.set(legacy_snapshot.into_values()).await?;
        Ok(true)
    }
}
