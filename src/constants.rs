//! Application-wide constants
//!
//! This module contains the storage keys, command identifiers and surface
//! defaults used throughout the application, providing a single source of
//! truth for constant values.

/// Keys used in every storage area (legacy and synced)
pub mod storage_keys {
    /// Array of snippet items
    pub const ITEMS: &str = "snippetItems";

    /// Id of the most recently inserted item
    pub const LAST_USED_ITEM_ID: &str = "lastUsedSnippetItemId";

    /// Slot → item id mapping
    pub const SHORTCUT_BINDINGS: &str = "shortcutBindings";

    /// Preferred presentation mode
    pub const DISPLAY_MODE: &str = "displayMode";

    /// All keys owned by the application, in migration order
    pub const ALL: [&str; 4] = [ITEMS, LAST_USED_ITEM_ID, SHORTCUT_BINDINGS, DISPLAY_MODE];
}

/// Keyboard shortcut slots and command ids
pub mod slots {
    /// Number of bindable shortcut slots
    pub const SLOT_COUNT: u8 = 10;

    /// Prefix of slot keys (`slot-1` .. `slot-10`)
    pub const SLOT_KEY_PREFIX: &str = "slot-";

    /// Prefix of slot command ids (`insert-snippet-slot-01` .. `-10`)
    pub const SLOT_COMMAND_PREFIX: &str = "insert-snippet-slot-";

    /// Command inserting the last used (or first) item
    pub const INSERT_LAST_USED_COMMAND: &str = "insert-last-used-snippet";
}

/// UI surface pages and standalone window defaults
pub mod surface {
    /// Default standalone window width in pixels
    pub const STANDALONE_WINDOW_WIDTH: u32 = 440;

    /// Default standalone window height in pixels
    pub const STANDALONE_WINDOW_HEIGHT: u32 = 760;

    /// Page loaded by the standalone window
    pub const STANDALONE_WINDOW_PATH: &str = "popup.html?displayHost=window";

    /// Page loaded by the toolbar popup
    pub const ACTION_POPUP_PATH: &str = "popup.html?displayHost=action-popup";
}

/// Snippet item defaults
pub mod items {
    /// Category assigned when none (or a blank one) is given
    pub const DEFAULT_CATEGORY: &str = "Uncategorized";
}

/// Configuration and data file locations
pub mod config {
    /// Directory name under the XDG config/data/runtime dirs
    pub const APP_DIR: &str = "quickfill";

    /// Config filename
    pub const FILENAME: &str = "config.json";

    /// Legacy (device-local) storage area file
    pub const LOCAL_AREA_FILE: &str = "local.json";

    /// Synced storage area file
    pub const SYNC_AREA_FILE: &str = "sync.json";

    /// Coordinator socket filename
    pub const SOCKET_FILE: &str = "coordinator.sock";
}

/// Config validation bounds
pub mod validation {
    /// Minimum standalone window dimension
    pub const MIN_WINDOW_DIMENSION: u32 = 200;

    /// Maximum standalone window dimension
    pub const MAX_WINDOW_DIMENSION: u32 = 4096;
}

/// IPC framing limits
pub mod ipc {
    /// Maximum message size (1 MiB)
    pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

    /// Capacity of storage change broadcast channels
    pub const CHANGE_CHANNEL_CAPACITY: usize = 64;
}
