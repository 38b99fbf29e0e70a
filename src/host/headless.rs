//! In-memory host used by the `serve` daemon
//!
//! Models one browser-like environment: normal windows with tabs, a side
//! panel per window, a toolbar popup and standalone windows. Surface changes
//! are logged instead of drawn, and inserted text lands in a per-tab field
//! buffer.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::Mutex;
use tracing::info;

use super::{
    HostCapabilities, HostError, InsertOutcome, SurfaceHost, TabInfo, TextInserter, WindowInfo,
    WindowKind, WindowRequest,
};

#[derive(Debug, Clone)]
struct HeadlessTab {
    info: TabInfo,
    active: bool,
    field: String,
}

#[derive(Debug, Default)]
struct HeadlessState {
    windows: Vec<WindowInfo>,
    tabs: Vec<HeadlessTab>,
    side_panels: BTreeSet<i64>,
    popup_open: bool,
    standalone_windows: Vec<WindowRequest>,
    open_panel_on_action_click: bool,
    popup: String,
    /// Most recently focused normal window
    last_normal_window: Option<i64>,
    next_id: i64,
}

impl HeadlessState {
    fn window_exists(&self, window_id: i64) -> bool {
        self.windows.iter().any(|window| window.id == window_id)
    }

    /// Focused normal window, else the last one that had focus
    fn current_normal_window(&self) -> Option<i64> {
        self.windows
            .iter()
            .find(|window| window.focused && window.kind == WindowKind::Normal)
            .map(|window| window.id)
            .or(self.last_normal_window.filter(|id| self.window_exists(*id)))
            .or_else(|| {
                self.windows
                    .iter()
                    .find(|window| window.kind == WindowKind::Normal)
                    .map(|window| window.id)
            })
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Read-only view of the host state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessSnapshot {
    pub side_panels: Vec<i64>,
    pub popup_open: bool,
    pub standalone_windows: Vec<WindowRequest>,
    pub open_panel_on_action_click: bool,
    pub popup: String,
}

pub struct HeadlessHost {
    capabilities: HostCapabilities,
    state: Mutex<HeadlessState>,
}

impl HeadlessHost {
    /// One focused normal window holding one active tab
    pub fn new(capabilities: HostCapabilities) -> Self {
        let mut state = HeadlessState::default();
        let window_id = state.next_id();
        let tab_id = state.next_id();
        state.windows.push(WindowInfo {
            id: window_id,
            kind: WindowKind::Normal,
            focused: true,
        });
        state.last_normal_window = Some(window_id);
        state.tabs.push(HeadlessTab {
            info: TabInfo { id: tab_id, window_id },
            active: true,
            field: String::new(),
        });

        Self {
            capabilities,
            state: Mutex::new(state),
        }
    }

    /// Add another normal window with one active tab; returns (window id, tab id)
    pub async fn open_normal_window(&self, focused: bool) -> (i64, i64) {
        let mut state = self.state.lock().await;
        let window_id = state.next_id();
        let tab_id = state.next_id();
        if focused {
            state.windows.iter_mut().for_each(|window| window.focused = false);
            state.last_normal_window = Some(window_id);
        }
        state.windows.push(WindowInfo {
            id: window_id,
            kind: WindowKind::Normal,
            focused,
        });
        state.tabs.push(HeadlessTab {
            info: TabInfo { id: tab_id, window_id },
            active: true,
            field: String::new(),
        });
        (window_id, tab_id)
    }

    /// Text inserted so far into a tab's focused field
    pub async fn field_text(&self, tab_id: i64) -> Option<String> {
        let state = self.state.lock().await;
        state
            .tabs
            .iter()
            .find(|tab| tab.info.id == tab_id)
            .map(|tab| tab.field.clone())
    }

    pub async fn snapshot(&self) -> HeadlessSnapshot {
        let state = self.state.lock().await;
        HeadlessSnapshot {
            side_panels: state.side_panels.iter().copied().collect(),
            popup_open: state.popup_open,
            standalone_windows: state.standalone_windows.clone(),
            open_panel_on_action_click: state.open_panel_on_action_click,
            popup: state.popup.clone(),
        }
    }
}

#[async_trait]
impl SurfaceHost for HeadlessHost {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    async fn tab(&self, tab_id: i64) -> Result<Option<TabInfo>, HostError> {
        let state = self.state.lock().await;
        Ok(state.tabs.iter().find(|tab| tab.info.id == tab_id).map(|tab| tab.info))
    }

    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        let state = self.state.lock().await;
        let window_id = state.current_normal_window();

        Ok(state
            .tabs
            .iter()
            .find(|tab| tab.active && Some(tab.info.window_id) == window_id)
            .map(|tab| tab.info))
    }

    async fn windows(&self) -> Result<Vec<WindowInfo>, HostError> {
        Ok(self.state.lock().await.windows.clone())
    }

    async fn create_window(&self, request: WindowRequest) -> Result<(), HostError> {
        let mut state = self.state.lock().await;
        let window_id = state.next_id();
        state.windows.iter_mut().for_each(|window| window.focused = false);
        state.windows.push(WindowInfo {
            id: window_id,
            kind: WindowKind::Popup,
            focused: true,
        });
        info!(
            window_id = window_id,
            url = %request.url,
            width = request.width,
            height = request.height,
            "Opened standalone window"
        );
        state.standalone_windows.push(request);
        Ok(())
    }

    async fn open_side_panel(&self, window_id: i64) -> Result<(), HostError> {
        if !self.capabilities.side_panel {
            return Err(HostError::CapabilityUnavailable("side panel"));
        }
        let mut state = self.state.lock().await;
        if !state.window_exists(window_id) {
            return Err(HostError::Other(format!("No window with id: {window_id}")));
        }
        state.side_panels.insert(window_id);
        info!(window_id = window_id, "Opened side panel");
        Ok(())
    }

    async fn close_side_panel(&self, window_id: Option<i64>) -> Result<(), HostError> {
        let mut state = self.state.lock().await;
        let closed = match window_id {
            Some(id) => state.side_panels.remove(&id),
            None => {
                let any_open = !state.side_panels.is_empty();
                state.side_panels.clear();
                any_open
            }
        };
        if !closed {
            return Err(HostError::Other("No active side panel".to_string()));
        }
        info!(window_id = ?window_id, "Closed side panel");
        Ok(())
    }

    async fn open_action_popup(&self, window_id: Option<i64>) -> Result<(), HostError> {
        if !self.capabilities.open_action_popup {
            return Err(HostError::CapabilityUnavailable("open action popup"));
        }
        let mut state = self.state.lock().await;
        if let Some(id) = window_id {
            if !state.window_exists(id) {
                return Err(HostError::Other(format!("No window with id: {id}")));
            }
        }
        state.popup_open = true;
        info!(window_id = ?window_id, "Opened toolbar popup");
        Ok(())
    }

    async fn set_panel_behavior(&self, open_on_action_click: bool) -> Result<(), HostError> {
        self.state.lock().await.open_panel_on_action_click = open_on_action_click;
        Ok(())
    }

    async fn set_popup(&self, popup: &str) -> Result<(), HostError> {
        self.state.lock().await.popup = popup.to_string();
        Ok(())
    }
}

#[async_trait]
impl TextInserter for HeadlessHost {
    async fn insert_text(&self, tab_id: i64, text: &str) -> InsertOutcome {
        let mut state = self.state.lock().await;
        match state.tabs.iter_mut().find(|tab| tab.info.id == tab_id) {
            Some(tab) => {
                tab.field.push_str(text);
                info!(tab_id = tab_id, chars = text.chars().count(), "Inserted snippet text");
                InsertOutcome::Inserted
            }
            None => InsertOutcome::Failed("no-editable-element".to_string()),
        }
    }
}
