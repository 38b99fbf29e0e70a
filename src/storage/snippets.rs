//! Typed access to snippet data in one storage area
//!
//! Items, the last-used item id, shortcut bindings and the display mode are
//! stored under fixed keys. Reads are lenient (bad data normalizes to empty
//! or default values); writes validate their input first.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::{StorageArea, StorageValues};
use crate::bindings::{ShortcutBindings, normalize_item_id};
use crate::constants::items::DEFAULT_CATEGORY;
use crate::constants::storage_keys;
use crate::display_mode::DisplayMode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("stored item is malformed: {0}")]
    Malformed(String),
}

/// A stored text snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetItem {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Absent on items copied over from legacy data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// User input for a new item
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
}

impl NewItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn into_item(self, now: DateTime<Utc>) -> Result<SnippetItem, ItemError> {
        Ok(SnippetItem {
            id: uuid::Uuid::new_v4().to_string(),
            title: required(&self.title, "title")?,
            content: required(&self.content, "content")?,
            category: normalize_category(self.category.as_deref()),
            created_at: Some(now),
            updated_at: Some(now),
        })
    }
}

/// Fields to change on an existing item; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

fn required(value: &str, field: &'static str) -> Result<String, ItemError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ItemError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn normalize_category(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_category)
}

/// Raw item array as stored; anything else reads as no items
pub fn raw_items(raw: &Value) -> Vec<Value> {
    raw.as_array().cloned().unwrap_or_default()
}

fn raw_item_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

/// Stored last-used id, or `None` when absent or blank
pub fn normalize_last_used(raw: &Value) -> Option<String> {
    raw.as_str()
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
}

/// Snippet data accessors bound to one storage area
#[derive(Clone)]
pub struct SnippetStore {
    area: Arc<dyn StorageArea>,
}

impl SnippetStore {
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self { area }
    }

    async fn read(&self, key: &str) -> Result<Value> {
        let mut values = self.area.get(&[key]).await?;
        Ok(values.remove(key).unwrap_or(Value::Null))
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        let mut values = StorageValues::new();
        values.insert(key.to_string(), value);
        self.area.set(values).await
    }

    async fn load_raw_items(&self) -> Result<Vec<Value>> {
        let raw = self.read(storage_keys::ITEMS).await?;
        Ok(raw_items(&raw))
    }

    async fn save_raw_items(&self, items: Vec<Value>) -> Result<()> {
        self.write(storage_keys::ITEMS, Value::Array(items)).await
    }

    async fn save_bindings(&self, bindings: &ShortcutBindings) -> Result<()> {
        self.write(storage_keys::SHORTCUT_BINDINGS, bindings.to_value()).await
    }

    /// Stored items, skipping entries that do not parse
    pub async fn load_items(&self) -> Result<Vec<SnippetItem>> {
        let raw = self.read(storage_keys::ITEMS).await?;
        let items = raw_items(&raw)
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value::<SnippetItem>(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(index = index, error = %e, "Skipping malformed snippet item");
                    None
                }
            })
            .collect();
        Ok(items)
    }

    /// Append one item; stored entries are written back as they were
    pub async fn add_item(&self, input: NewItem) -> Result<SnippetItem> {
        let item = input.into_item(Utc::now())?;
        let mut items = self.load_raw_items().await?;
        items.push(serde_json::to_value(&item)?);
        self.save_raw_items(items).await?;
        info!(id = %item.id, title = %item.title, "Added snippet item");
        Ok(item)
    }

    /// Patch the stored entry in place, keeping fields this type does not know
    pub async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<SnippetItem> {
        let id = required(id, "id")?;
        let mut items = self.load_raw_items().await?;
        let fields = items
            .iter_mut()
            .filter(|value| raw_item_id(value) == Some(id.as_str()))
            .find_map(Value::as_object_mut)
            .ok_or_else(|| ItemError::NotFound(id.clone()))?;

        if let Some(title) = &patch.title {
            fields.insert("title".to_string(), Value::String(required(title, "title")?));
        }
        if let Some(content) = &patch.content {
            fields.insert("content".to_string(), Value::String(required(content, "content")?));
        }
        let category = match &patch.category {
            Some(category) => normalize_category(Some(category.as_str())),
            None => normalize_category(fields.get("category").and_then(Value::as_str)),
        };
        fields.insert("category".to_string(), Value::String(category));
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);

        let updated = serde_json::from_value::<SnippetItem>(Value::Object(fields.clone()))
            .map_err(|e| {
                warn!(id = %id, error = %e, "Stored item does not parse after update");
                ItemError::Malformed(id.clone())
            })?;
        self.save_raw_items(items).await?;
        Ok(updated)
    }

    /// Remove an item and release its shortcut slot
    pub async fn delete_item(&self, id: &str) -> Result<()> {
        let id = required(id, "id")?;
        let mut items = self.load_raw_items().await?;
        items.retain(|value| raw_item_id(value) != Some(id.as_str()));
        self.save_raw_items(items).await?;
        self.clear_binding_for_item(&id).await?;
        info!(id = %id, "Deleted snippet item");
        Ok(())
    }

    /// Replace every item in one write, resetting last-used and bindings
    pub async fn replace_all_items(&self, inputs: Vec<NewItem>) -> Result<Vec<SnippetItem>> {
        let now = Utc::now();
        let items = inputs
            .into_iter()
            .map(|input| input.into_item(now))
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = StorageValues::new();
        values.insert(storage_keys::ITEMS.to_string(), serde_json::to_value(&items)?);
        values.insert(storage_keys::LAST_USED_ITEM_ID.to_string(), Value::Null);
        values.insert(
            storage_keys::SHORTCUT_BINDINGS.to_string(),
            ShortcutBindings::new().to_value(),
        );
        self.area.set(values).await?;

        info!(count = items.len(), "Replaced all snippet items");
        Ok(items)
    }

    pub async fn set_last_used_item_id(&self, id: Option<&str>) -> Result<()> {
        let value = id
            .and_then(normalize_item_id)
            .map(Value::String)
            .unwrap_or(Value::Null);
        self.write(storage_keys::LAST_USED_ITEM_ID, value).await
    }

    pub async fn last_used_item_id(&self) -> Result<Option<String>> {
        let raw = self.read(storage_keys::LAST_USED_ITEM_ID).await?;
        Ok(normalize_last_used(&raw))
    }

    pub async fn shortcut_bindings(&self) -> Result<ShortcutBindings> {
        let raw = self.read(storage_keys::SHORTCUT_BINDINGS).await?;
        Ok(ShortcutBindings::normalize(&raw))
    }

    /// Read-modify-write of the binding map
    ///
    /// Two concurrent reassignments may lose one update; binding writes are
    /// rare and user-initiated.
    pub async fn set_shortcut_binding_for_slot(
        &self,
        slot: &str,
        item_id: Option<&str>,
    ) -> Result<ShortcutBindings> {
        let bindings = self.shortcut_bindings().await?;
        let next = bindings.set_binding(slot, item_id)?;
        self.save_bindings(&next).await?;
        Ok(next)
    }

    pub async fn clear_binding_for_item(&self, item_id: &str) -> Result<ShortcutBindings> {
        let bindings = self.shortcut_bindings().await?;
        let next = bindings.clear_binding_for_item(item_id);
        self.save_bindings(&next).await?;
        Ok(next)
    }

    pub async fn display_mode(&self) -> Result<DisplayMode> {
        let raw = self.read(storage_keys::DISPLAY_MODE).await?;
        Ok(DisplayMode::normalize(&raw))
    }

    pub async fn set_display_mode(&self, mode: DisplayMode) -> Result<DisplayMode> {
        self.write(storage_keys::DISPLAY_MODE, Value::String(mode.as_str().to_string()))
            .await?;
        Ok(mode)
    }
}
