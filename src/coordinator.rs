//! Display surface coordination
//!
//! Three mutually exclusive surfaces can host the UI: the attached side
//! panel, the toolbar popup and a standalone window. The coordinator owns
//! the cached display mode preference and decides, for each activation
//! request, which host calls to make and what the requesting surface should
//! do next (stay, or close itself).

use anyhow::Result;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::constants::storage_keys::DISPLAY_MODE;
use crate::constants::surface::{ACTION_POPUP_PATH, STANDALONE_WINDOW_PATH};
use crate::display_mode::{DisplayMode, SourceHost};
use crate::host::{HostError, SurfaceHost, TabInfo, WindowKind, WindowRequest};
use crate::storage::{SnippetStore, StorageChange};

/// Where an activation request came from, used to pick the target window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowContext {
    pub requested_window_id: Option<i64>,
    pub sender_tab_id: Option<i64>,
}

/// Result of an immediate mode switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationOutcome {
    pub applied_now: bool,
    /// The requesting surface should close itself
    pub should_close_current_surface: bool,
    /// The host refused because the call was not made from a direct click
    pub blocked_by_user_gesture: bool,
}

impl ActivationOutcome {
    fn applied(should_close_current_surface: bool) -> Self {
        Self {
            applied_now: true,
            should_close_current_surface,
            blocked_by_user_gesture: false,
        }
    }

    fn not_applied() -> Self {
        Self::default()
    }

    fn blocked_by_gesture() -> Self {
        Self {
            blocked_by_user_gesture: true,
            ..Self::default()
        }
    }
}

/// Standalone window dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
}

pub struct SurfaceCoordinator {
    host: Arc<dyn SurfaceHost>,
    store: SnippetStore,
    window: WindowSettings,
    current_mode: RwLock<DisplayMode>,
}

impl SurfaceCoordinator {
    pub fn new(host: Arc<dyn SurfaceHost>, store: SnippetStore, window: WindowSettings) -> Self {
        Self {
            host,
            store,
            window,
            current_mode: RwLock::new(DisplayMode::default()),
        }
    }

    pub fn current_mode(&self) -> DisplayMode {
        *self.current_mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mode(&self, mode: DisplayMode) {
        *self.current_mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    /// Reload the preference from storage and re-apply default behaviour
    ///
    /// Called at startup; the process may have been restarted since the
    /// last preference change.
    pub async fn resync(&self) -> Result<DisplayMode> {
        let mode = self.store.display_mode().await?;
        self.cache_mode(mode);
        self.apply_as_default(mode).await?;
        info!(mode = %mode, "Display mode synchronized from storage");
        Ok(mode)
    }

    /// Configure what a toolbar icon click opens by default
    pub async fn apply_as_default(&self, mode: DisplayMode) -> Result<(), HostError> {
        let capabilities = self.host.capabilities();

        if capabilities.side_panel {
            self.host
                .set_panel_behavior(mode == DisplayMode::Attached)
                .await?;
        }

        if capabilities.set_popup {
            let popup = if mode == DisplayMode::Popup { ACTION_POPUP_PATH } else { "" };
            self.host.set_popup(popup).await?;
        }

        debug!(mode = %mode, "Applied default toolbar behavior");
        Ok(())
    }

    /// Persist a new preference and make it the default behaviour
    pub async fn apply_preference(&self, mode: DisplayMode) -> Result<DisplayMode> {
        let mode = self.store.set_display_mode(mode).await?;
        self.cache_mode(mode);
        self.apply_as_default(mode).await?;
        info!(mode = %mode, "Display mode preference applied");
        Ok(mode)
    }

    /// Track preference writes made through any path
    pub async fn handle_storage_change(&self, change: &StorageChange) -> Result<(), HostError> {
        if change.key != DISPLAY_MODE {
            return Ok(());
        }

        let mode = DisplayMode::normalize(&change.new_value);
        debug!(area = %change.area, mode = %mode, "Display mode changed in storage");
        self.cache_mode(mode);
        self.apply_as_default(mode).await
    }

    /// Apply storage changes until the channel closes
    pub async fn watch_storage_changes(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<StorageChange>,
    ) {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    if let Err(e) = self.handle_storage_change(&change).await {
                        error!(
                            error = %e,
                            "Failed to update toolbar behavior after storage change"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Missed storage changes, resynchronizing");
                    if let Err(e) = self.resync().await {
                        error!(error = ?e, "Failed to resynchronize display mode");
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Switch to `target` right now on behalf of the `source` surface
    ///
    /// Only a failure to create the standalone window is returned as an
    /// error; every other failure is reported through the outcome.
    pub async fn activate_now(
        &self,
        target: DisplayMode,
        source: SourceHost,
        context: &WindowContext,
    ) -> Result<ActivationOutcome, HostError> {
        info!(
            target = %target,
            source = %source,
            requested_window = ?context.requested_window_id,
            "Activating display mode"
        );

        let outcome = match target {
            DisplayMode::Window => self.activate_window(source, context).await?,
            DisplayMode::Attached => self.activate_attached(source, context).await,
            DisplayMode::Popup => self.activate_popup(source, context).await,
        };

        info!(
            applied_now = outcome.applied_now,
            should_close = outcome.should_close_current_surface,
            blocked_by_user_gesture = outcome.blocked_by_user_gesture,
            "Activation finished"
        );
        Ok(outcome)
    }

    async fn activate_window(
        &self,
        source: SourceHost,
        context: &WindowContext,
    ) -> Result<ActivationOutcome, HostError> {
        if source == SourceHost::Window {
            return Ok(ActivationOutcome::applied(false));
        }

        // Resolve before the new window steals focus
        let window_id = self.resolve_window_id(context).await;
        self.open_standalone_window(context.sender_tab_id, window_id).await?;

        if source == SourceHost::Attached {
            self.advisory_close_attached(window_id).await;
        }

        // A closing side panel goes away on its own; a popup must close itself
        Ok(ActivationOutcome::applied(source == SourceHost::ActionPopup))
    }

    async fn activate_attached(
        &self,
        source: SourceHost,
        context: &WindowContext,
    ) -> ActivationOutcome {
        if source == SourceHost::Attached {
            return ActivationOutcome::applied(false);
        }

        if !self.host.capabilities().side_panel {
            warn!("Host has no side panel support, attached mode cannot be activated");
            return ActivationOutcome::not_applied();
        }

        let Some(window_id) = self.resolve_window_id(context).await else {
            warn!("No window available to host the side panel");
            return ActivationOutcome::not_applied();
        };

        match self.host.open_side_panel(window_id).await {
            Ok(()) => ActivationOutcome::applied(matches!(
                source,
                SourceHost::Window | SourceHost::ActionPopup
            )),
            Err(HostError::GestureRequired) => {
                warn!(window_id = window_id, "Side panel needs a direct user click");
                ActivationOutcome::blocked_by_gesture()
            }
            Err(e) => {
                warn!(window_id = window_id, error = %e, "Failed to open side panel");
                ActivationOutcome::not_applied()
            }
        }
    }

    async fn activate_popup(
        &self,
        source: SourceHost,
        context: &WindowContext,
    ) -> ActivationOutcome {
        if source == SourceHost::ActionPopup {
            return ActivationOutcome::applied(false);
        }

        if !self.host.capabilities().open_action_popup {
            warn!("Host cannot open the toolbar popup programmatically");
            return ActivationOutcome::not_applied();
        }

        let Some(window_id) = self.resolve_window_id(context).await else {
            warn!("No window available to host the toolbar popup");
            return ActivationOutcome::not_applied();
        };

        let result = match self.host.open_action_popup(Some(window_id)).await {
            Err(HostError::UnsupportedOption(option)) => {
                debug!(option = option, "Retrying toolbar popup without window id");
                self.host.open_action_popup(None).await
            }
            other => other,
        };

        match result {
            Ok(()) => {
                if source == SourceHost::Attached {
                    self.advisory_close_attached(Some(window_id)).await;
                }
                ActivationOutcome::applied(source == SourceHost::Window)
            }
            Err(e) => {
                warn!(window_id = window_id, error = %e, "Failed to open toolbar popup");
                ActivationOutcome::not_applied()
            }
        }
    }

    /// Toolbar icon clicked while no default surface handled it
    pub async fn handle_toolbar_click(&self, tab: Option<TabInfo>) -> Result<(), HostError> {
        match self.current_mode() {
            DisplayMode::Window => {
                let window_id = self.active_window_id(tab).await;
                self.open_standalone_window(tab.map(|tab| tab.id), window_id).await
            }
            DisplayMode::Popup => Ok(()),
            DisplayMode::Attached => {
                if self.host.capabilities().side_panel {
                    return Ok(());
                }
                warn!("Side panel not supported by host, opening standalone window instead");
                let window_id = self.active_window_id(tab).await;
                self.open_standalone_window(tab.map(|tab| tab.id), window_id).await
            }
        }
    }

    /// Target window for a side panel or toolbar popup
    ///
    /// Priority: explicit request, sender's window, focused normal window,
    /// first normal window. Lookup failures count as "not found".
    async fn resolve_window_id(&self, context: &WindowContext) -> Option<i64> {
        if let Some(window_id) = context.requested_window_id {
            return Some(window_id);
        }

        if let Some(tab_id) = context.sender_tab_id {
            match self.host.tab(tab_id).await {
                Ok(Some(tab)) => return Some(tab.window_id),
                Ok(None) => debug!(tab_id = tab_id, "Sender tab no longer exists"),
                Err(e) => debug!(tab_id = tab_id, error = %e, "Sender tab lookup failed"),
            }
        }

        let windows = match self.host.windows().await {
            Ok(windows) => windows,
            Err(e) => {
                debug!(error = %e, "Window lookup failed");
                return None;
            }
        };

        windows
            .iter()
            .find(|window| window.focused && window.kind == WindowKind::Normal)
            .or_else(|| windows.iter().find(|window| window.kind == WindowKind::Normal))
            .map(|window| window.id)
    }

    async fn active_window_id(&self, tab: Option<TabInfo>) -> Option<i64> {
        if let Some(tab) = tab {
            return Some(tab.window_id);
        }
        match self.host.active_tab().await {
            Ok(tab) => tab.map(|tab| tab.window_id),
            Err(e) => {
                debug!(error = %e, "Active tab lookup failed");
                None
            }
        }
    }

    async fn open_standalone_window(
        &self,
        tab_id: Option<i64>,
        window_id: Option<i64>,
    ) -> Result<(), HostError> {
        let mut url = STANDALONE_WINDOW_PATH.to_string();
        if let Some(tab_id) = tab_id {
            url.push_str(&format!("&targetTabId={tab_id}"));
        }
        if let Some(window_id) = window_id {
            url.push_str(&format!("&targetWindowId={window_id}"));
        }

        self.host
            .create_window(WindowRequest {
                url,
                width: self.window.width,
                height: self.window.height,
            })
            .await
    }

    /// Best-effort close of the attached surface
    ///
    /// The panel may already be gone; failure is ignored.
    async fn advisory_close_attached(&self, window_id: Option<i64>) {
        if !self.host.capabilities().side_panel {
            return;
        }
        if let Err(e) = self.host.close_side_panel(window_id).await {
            debug!(window_id = ?window_id, error = %e, "Advisory close of attached surface failed");
        }
    }
}
