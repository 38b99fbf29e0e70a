//! Shortcut slot bindings
//!
//! Ten fixed keyboard shortcut slots, each bound to at most one snippet item.
//! Every transform here is pure: callers read the current mapping, derive the
//! next one and persist it wholesale.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::slots::{SLOT_COMMAND_PREFIX, SLOT_COUNT, SLOT_KEY_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("invalid slot key: {0}")]
    InvalidSlot(String),
}

/// One of the ten well-known shortcut slots (`slot-1` .. `slot-10`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey(u8);

impl SlotKey {
    pub fn new(index: u8) -> Option<Self> {
        (1..=SLOT_COUNT).contains(&index).then_some(Self(index))
    }

    /// All slots in display order
    pub fn all() -> impl Iterator<Item = SlotKey> {
        (1..=SLOT_COUNT).map(SlotKey)
    }

    /// Storage key, e.g. `slot-3`
    pub fn as_key(self) -> String {
        format!("{SLOT_KEY_PREFIX}{}", self.0)
    }

    /// Keyboard command id, e.g. `insert-snippet-slot-03`
    pub fn command(self) -> String {
        format!("{SLOT_COMMAND_PREFIX}{:02}", self.0)
    }

    /// Exact match against the fixed key set (`slot-01` is not a slot key)
    pub fn parse(key: &str) -> Option<Self> {
        Self::all().find(|slot| slot.as_key() == key)
    }

    pub fn from_command(command: &str) -> Option<Self> {
        Self::all().find(|slot| slot.command() == command)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SLOT_KEY_PREFIX}{}", self.0)
    }
}

impl FromStr for SlotKey {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| BindingError::InvalidSlot(s.to_string()))
    }
}

/// Trimmed, non-empty item id or nothing
pub fn normalize_item_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Slot → item id mapping
///
/// Invariants kept by every transform:
/// - only the ten fixed slot keys appear
/// - an item id occupies at most one slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutBindings {
    slots: BTreeMap<SlotKey, String>,
}

impl ShortcutBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from an untrusted stored value
    ///
    /// Unknown keys and values that are not non-empty strings are dropped.
    /// Anything that is not a JSON object yields an empty mapping.
    pub fn normalize(raw: &Value) -> Self {
        let Some(object) = raw.as_object() else {
            return Self::default();
        };

        let slots = SlotKey::all()
            .filter_map(|slot| {
                let item_id = object
                    .get(&slot.as_key())
                    .and_then(Value::as_str)
                    .and_then(normalize_item_id)?;
                Some((slot, item_id))
            })
            .collect();

        Self { slots }
    }

    /// Bind `item_id` to `slot`, or clear `slot` when `item_id` is blank
    ///
    /// Whatever slot previously held `item_id` is released.
    pub fn set_binding(&self, slot: &str, item_id: Option<&str>) -> Result<Self, BindingError> {
        let target: SlotKey = slot.parse()?;
        Ok(self.with_binding(target, item_id))
    }

    /// Typed form of [`set_binding`](Self::set_binding)
    pub fn with_binding(&self, target: SlotKey, item_id: Option<&str>) -> Self {
        let item_id = item_id.and_then(normalize_item_id);

        let mut slots: BTreeMap<SlotKey, String> = self
            .slots
            .iter()
            .filter(|(slot, current)| {
                **slot != target && Some(current.as_str()) != item_id.as_deref()
            })
            .map(|(slot, current)| (*slot, current.clone()))
            .collect();

        if let Some(item_id) = item_id {
            slots.insert(target, item_id);
        }

        Self { slots }
    }

    /// Drop whichever slot holds `item_id`; no-op for unbound items
    pub fn clear_binding_for_item(&self, item_id: &str) -> Self {
        let Some(item_id) = normalize_item_id(item_id) else {
            return self.clone();
        };

        let slots = self
            .slots
            .iter()
            .filter(|(_, current)| **current != item_id)
            .map(|(slot, current)| (*slot, current.clone()))
            .collect();

        Self { slots }
    }

    /// Item bound to the slot a keyboard command refers to
    pub fn find_item_for_command(&self, command: &str) -> Option<&str> {
        SlotKey::from_command(command).and_then(|slot| self.get(slot))
    }

    pub fn find_slot_for_item(&self, item_id: &str) -> Option<SlotKey> {
        let item_id = normalize_item_id(item_id)?;
        self.slots
            .iter()
            .find(|(_, current)| **current == item_id)
            .map(|(slot, _)| *slot)
    }

    pub fn get(&self, slot: SlotKey) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &str)> {
        self.slots.iter().map(|(slot, item_id)| (*slot, item_id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// JSON object form, as persisted
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.slots
                .iter()
                .map(|(slot, item_id)| (slot.as_key(), Value::String(item_id.clone())))
                .collect(),
        )
    }
}

impl Serialize for ShortcutBindings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (slot, item_id) in &self.slots {
            map.serialize_entry(&slot.as_key(), item_id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ShortcutBindings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(index: u8) -> SlotKey {
        SlotKey::new(index).unwrap()
    }

    #[test]
    fn test_defines_ten_slots_and_commands() {
        let keys: Vec<String> = SlotKey::all().map(SlotKey::as_key).collect();
        assert_eq!(keys.len(), 10);
        assert_eq!(keys.first().map(String::as_str), Some("slot-1"));
        assert_eq!(keys.last().map(String::as_str), Some("slot-10"));

        assert_eq!(slot(1).command(), "insert-snippet-slot-01");
        assert_eq!(slot(10).command(), "insert-snippet-slot-10");
        assert_eq!(SlotKey::from_command("insert-snippet-slot-07"), Some(slot(7)));
        assert_eq!(SlotKey::from_command("insert-snippet-slot-7"), None);
        assert_eq!(SlotKey::from_command("insert-last-used-snippet"), None);
    }

    #[test]
    fn test_slot_key_parse_is_exact() {
        assert_eq!(SlotKey::parse("slot-10"), Some(slot(10)));
        assert_eq!(SlotKey::parse("slot-0"), None);
        assert_eq!(SlotKey::parse("slot-11"), None);
        assert_eq!(SlotKey::parse("slot-01"), None);
        assert_eq!(SlotKey::parse(" slot-1"), None);
        assert!("slot-4".parse::<SlotKey>().is_ok());
        assert_eq!(
            "nope".parse::<SlotKey>(),
            Err(BindingError::InvalidSlot("nope".to_string()))
        );
    }

    #[test]
    fn test_normalize_drops_invalid_entries() {
        let normalized = ShortcutBindings::normalize(&json!({
            "slot-1": "item-a",
            "slot-2": "  ",
            "slot-3": 42,
            "slot-4": "  item-d  ",
            "invalid": "item-x"
        }));

        assert_eq!(normalized.to_value(), json!({ "slot-1": "item-a", "slot-4": "item-d" }));
    }

    #[test]
    fn test_normalize_non_object_is_empty() {
        assert!(ShortcutBindings::normalize(&Value::Null).is_empty());
        assert!(ShortcutBindings::normalize(&json!("slot-1")).is_empty());
        assert!(ShortcutBindings::normalize(&json!(["item-a"])).is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = json!({ "slot-2": " b ", "slot-9": "z", "slot-99": "q" });
        let once = ShortcutBindings::normalize(&raw);
        let twice = ShortcutBindings::normalize(&once.to_value());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_binding_moves_item_to_new_slot() {
        let bindings = ShortcutBindings::normalize(&json!({ "slot-1": "item-a" }));

        let next = bindings.set_binding("slot-2", Some("item-a")).unwrap();

        assert_eq!(next.to_value(), json!({ "slot-2": "item-a" }));
    }

    #[test]
    fn test_set_binding_replaces_slot_occupant() {
        let bindings =
            ShortcutBindings::normalize(&json!({ "slot-1": "item-a", "slot-2": "item-b" }));

        let next = bindings.set_binding("slot-1", Some("item-c")).unwrap();

        assert_eq!(next.to_value(), json!({ "slot-1": "item-c", "slot-2": "item-b" }));
    }

    #[test]
    fn test_set_binding_same_item_same_slot_is_stable() {
        let bindings = ShortcutBindings::normalize(&json!({ "slot-5": "item-a" }));
        let next = bindings.set_binding("slot-5", Some("item-a")).unwrap();
        assert_eq!(next, bindings);
    }

    #[test]
    fn test_set_binding_blank_item_unbinds_slot() {
        let bindings =
            ShortcutBindings::normalize(&json!({ "slot-1": "item-a", "slot-2": "item-b" }));

        let cleared = bindings.set_binding("slot-1", None).unwrap();
        assert_eq!(cleared.to_value(), json!({ "slot-2": "item-b" }));

        let cleared = bindings.set_binding("slot-2", Some("   ")).unwrap();
        assert_eq!(cleared.to_value(), json!({ "slot-1": "item-a" }));
    }

    #[test]
    fn test_set_binding_rejects_unknown_slot() {
        let bindings = ShortcutBindings::new();
        let err = bindings.set_binding("slot-11", Some("item-a")).unwrap_err();
        assert_eq!(err, BindingError::InvalidSlot("slot-11".to_string()));
    }

    #[test]
    fn test_set_binding_then_find_slot() {
        let bindings = ShortcutBindings::normalize(&json!({ "slot-3": "item-c" }));
        let next = bindings.set_binding("slot-8", Some(" item-x ")).unwrap();
        assert_eq!(next.find_slot_for_item("item-x"), Some(slot(8)));
        assert_eq!(next.find_slot_for_item("item-c"), Some(slot(3)));
    }

    #[test]
    fn test_item_occupies_at_most_one_slot_across_sequences() {
        let items = [Some("a"), Some("b"), None, Some("c")];
        let mut bindings = ShortcutBindings::new();

        // Deterministic walk over slot/item combinations
        for round in 0..200u32 {
            let slot = slot((round * 7 % 10 + 1) as u8);
            let item = items[(round * 3 % 4) as usize];
            bindings = bindings.with_binding(slot, item);

            for (_, item_id) in bindings.iter() {
                let holders = bindings.iter().filter(|(_, other)| *other == item_id).count();
                assert_eq!(holders, 1, "item {item_id} bound twice after round {round}");
            }
            if let Some(item) = item {
                assert_eq!(bindings.find_slot_for_item(item), Some(slot));
            }
        }
    }

    #[test]
    fn test_clear_binding_for_item() {
        let bindings =
            ShortcutBindings::normalize(&json!({ "slot-1": "item-a", "slot-2": "item-b" }));

        let next = bindings.clear_binding_for_item("item-a");
        assert_eq!(next.to_value(), json!({ "slot-2": "item-b" }));

        // Unbound item and blank id leave the mapping untouched
        assert_eq!(next.clear_binding_for_item("item-a"), next);
        assert_eq!(next.clear_binding_for_item("  "), next);
    }

    #[test]
    fn test_find_item_for_command() {
        let bindings =
            ShortcutBindings::normalize(&json!({ "slot-2": "item-b", "slot-10": "item-j" }));
        assert_eq!(bindings.find_item_for_command("insert-snippet-slot-02"), Some("item-b"));
        assert_eq!(bindings.find_item_for_command("insert-snippet-slot-10"), Some("item-j"));
        assert_eq!(bindings.find_item_for_command("insert-snippet-slot-03"), None);
        assert_eq!(bindings.find_item_for_command("unknown"), None);
    }

    #[test]
    fn test_serde_uses_slot_keys() {
        let bindings = ShortcutBindings::new()
            .with_binding(slot(10), Some("j"))
            .with_binding(slot(2), Some("b"));

        let text = serde_json::to_string(&bindings).unwrap();
        assert_eq!(text, r#"{"slot-2":"b","slot-10":"j"}"#);

        let parsed: ShortcutBindings =
            serde_json::from_str(r#"{"slot-2":"b","bogus":"x"}"#).unwrap();
        assert_eq!(parsed.to_value(), json!({ "slot-2": "b" }));
    }
}
