//! Host environment abstraction
//!
//! The coordinator never talks to a concrete window system. Everything it
//! needs (window/tab lookups, opening and closing surfaces, default toolbar
//! behaviour, text insertion) goes through the traits here, and every
//! failure comes back already classified as a [`HostError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod headless;

pub use headless::HeadlessHost;

/// Which optional host features exist, decided once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    /// Attached side panel surface (open + default-on-click behaviour)
    pub side_panel: bool,
    /// Programmatically opening the toolbar popup
    pub open_action_popup: bool,
    /// Configuring the static toolbar popup page
    pub set_popup: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            side_panel: true,
            open_action_popup: true,
            set_popup: true,
        }
    }
}

/// Classified failure of a host call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The call is only allowed in direct response to a user click
    #[error("action requires a direct user gesture")]
    GestureRequired,
    /// The host rejected an optional argument of the call
    #[error("host does not support option: {0}")]
    UnsupportedOption(&'static str),
    #[error("host capability unavailable: {0}")]
    CapabilityUnavailable(&'static str),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    Normal,
    Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: i64,
    pub kind: WindowKind,
    pub focused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabInfo {
    pub id: i64,
    pub window_id: i64,
}

/// Standalone window to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait SurfaceHost: Send + Sync {
    fn capabilities(&self) -> HostCapabilities;

    async fn tab(&self, tab_id: i64) -> Result<Option<TabInfo>, HostError>;

    /// Active tab of the last focused window
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError>;

    async fn windows(&self) -> Result<Vec<WindowInfo>, HostError>;

    async fn create_window(&self, request: WindowRequest) -> Result<(), HostError>;

    async fn open_side_panel(&self, window_id: i64) -> Result<(), HostError>;

    async fn close_side_panel(&self, window_id: Option<i64>) -> Result<(), HostError>;

    /// Open the toolbar popup, optionally in a specific window
    async fn open_action_popup(&self, window_id: Option<i64>) -> Result<(), HostError>;

    /// Whether clicking the toolbar icon opens the side panel
    async fn set_panel_behavior(&self, open_on_action_click: bool) -> Result<(), HostError>;

    /// Static popup page shown on toolbar click; empty means none
    async fn set_popup(&self, popup: &str) -> Result<(), HostError>;
}

/// Result of inserting text into the focused editable element of a tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Failed(String),
}

#[async_trait]
pub trait TextInserter: Send + Sync {
    async fn insert_text(&self, tab_id: i64, text: &str) -> InsertOutcome;
}
