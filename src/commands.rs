//! Keyboard shortcut commands
//!
//! Each command inserts one snippet into the focused field of a tab: either
//! the item bound to a numbered slot, or the last used item.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bindings::SlotKey;
use crate::constants::slots::INSERT_LAST_USED_COMMAND;
use crate::host::{InsertOutcome, SurfaceHost, TextInserter};
use crate::migration::StorageMigrator;
use crate::storage::{SnippetItem, SnippetStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutCommand {
    Slot(SlotKey),
    InsertLastUsed,
}

impl ShortcutCommand {
    pub fn parse(command: &str) -> Option<Self> {
        if command == INSERT_LAST_USED_COMMAND {
            return Some(Self::InsertLastUsed);
        }
        SlotKey::from_command(command).map(Self::Slot)
    }

    pub fn id(self) -> String {
        match self {
            Self::Slot(slot) => slot.command(),
            Self::InsertLastUsed => INSERT_LAST_USED_COMMAND.to_string(),
        }
    }
}

/// Item matching the last-used id, else the first item
pub fn pick_item_for_quick_insert<'a>(
    items: &'a [SnippetItem],
    last_used_item_id: Option<&str>,
) -> Option<&'a SnippetItem> {
    let last_used = last_used_item_id.map(str::trim).filter(|id| !id.is_empty());

    last_used
        .and_then(|id| items.iter().find(|item| item.id == id))
        .or_else(|| items.first())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Inserted { item_id: String },
    NoItems,
    Unbound,
    /// Slot bound to an item that no longer exists
    MissingItem { item_id: String },
    NoTab,
    InsertFailed { reason: String },
}

impl CommandOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Inserted { item_id } | Self::MissingItem { item_id } => Some(item_id),
            _ => None,
        }
    }

    /// Machine-readable reason for outcomes that inserted nothing
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Inserted { .. } => None,
            Self::NoItems => Some("no-items"),
            Self::Unbound => Some("unbound"),
            Self::MissingItem { .. } => Some("missing-item"),
            Self::NoTab => Some("no-tab"),
            Self::InsertFailed { reason } => Some(reason),
        }
    }
}

pub struct CommandRunner {
    store: SnippetStore,
    host: Arc<dyn SurfaceHost>,
    inserter: Arc<dyn TextInserter>,
    migrator: StorageMigrator,
}

impl CommandRunner {
    pub fn new(
        store: SnippetStore,
        host: Arc<dyn SurfaceHost>,
        inserter: Arc<dyn TextInserter>,
        migrator: StorageMigrator,
    ) -> Self {
        Self {
            store,
            host,
            inserter,
            migrator,
        }
    }

    pub async fn run(
        &self,
        command: ShortcutCommand,
        tab_id: Option<i64>,
    ) -> Result<CommandOutcome> {
        self.migrator.migrate().await?;

        let outcome = match self.resolve_item(command).await? {
            Ok(item) => self.insert(&item, tab_id).await?,
            Err(outcome) => outcome,
        };

        match &outcome {
            CommandOutcome::Inserted { item_id } => {
                info!(command = %command.id(), item_id = %item_id, "Shortcut inserted snippet");
            }
            CommandOutcome::NoItems => warn!(command = %command.id(), "No snippet items to insert"),
            CommandOutcome::Unbound => {
                warn!(command = %command.id(), "Shortcut slot has no bound item");
            }
            CommandOutcome::MissingItem { item_id } => {
                warn!(
                    command = %command.id(),
                    item_id = %item_id,
                    "Bound item no longer exists, rebind the slot"
                );
            }
            CommandOutcome::NoTab => {
                warn!(command = %command.id(), "No tab available for insertion");
            }
            CommandOutcome::InsertFailed { reason } => {
                warn!(command = %command.id(), reason = %reason, "Shortcut insertion failed");
            }
        }

        Ok(outcome)
    }

    async fn resolve_item(
        &self,
        command: ShortcutCommand,
    ) -> Result<Result<SnippetItem, CommandOutcome>> {
        let items = self.store.load_items().await?;

        let resolved = match command {
            ShortcutCommand::InsertLastUsed => {
                let last_used = self.store.last_used_item_id().await?;
                pick_item_for_quick_insert(&items, last_used.as_deref())
                    .cloned()
                    .ok_or(CommandOutcome::NoItems)
            }
            ShortcutCommand::Slot(slot) => {
                let bindings = self.store.shortcut_bindings().await?;
                match bindings.get(slot) {
                    None => Err(CommandOutcome::Unbound),
                    Some(item_id) => items
                        .iter()
                        .find(|item| item.id == item_id)
                        .cloned()
                        .ok_or_else(|| CommandOutcome::MissingItem {
                            item_id: item_id.to_string(),
                        }),
                }
            }
        };
        Ok(resolved)
    }

    async fn insert(&self, item: &SnippetItem, tab_id: Option<i64>) -> Result<CommandOutcome> {
        let tab_id = match tab_id {
            Some(id) => Some(id),
            None => self.host.active_tab().await?.map(|tab| tab.id),
        };
        let Some(tab_id) = tab_id else {
            return Ok(CommandOutcome::NoTab);
        };

        match self.inserter.insert_text(tab_id, &item.content).await {
            InsertOutcome::Inserted => {
                self.store.set_last_used_item_id(Some(&item.id)).await?;
                Ok(CommandOutcome::Inserted {
                    item_id: item.id.clone(),
                })
            }
            InsertOutcome::Failed(reason) => Ok(CommandOutcome::InsertFailed { reason }),
        }
    }
}
