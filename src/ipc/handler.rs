//! IPC request handling for the coordinator daemon

use anyhow::Result;
use std::sync::Arc;
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};

use super::{
    AckResponse, ActivateResponse, ApplyResponse, CommandResponse, CoordinatorRequest,
    CoordinatorResponse, CoordinatorServer, read_frame, write_message,
};
use crate::commands::{CommandRunner, ShortcutCommand};
use crate::coordinator::{SurfaceCoordinator, WindowContext};
use crate::host::SurfaceHost;

/// Turns requests into responses; no error escapes as anything but `ok: false`
pub struct RequestHandler {
    coordinator: Arc<SurfaceCoordinator>,
    commands: CommandRunner,
    host: Arc<dyn SurfaceHost>,
}

impl RequestHandler {
    pub fn new(
        coordinator: Arc<SurfaceCoordinator>,
        commands: CommandRunner,
        host: Arc<dyn SurfaceHost>,
    ) -> Self {
        Self {
            coordinator,
            commands,
            host,
        }
    }

    pub async fn handle(&self, request: CoordinatorRequest) -> CoordinatorResponse {
        match request {
            CoordinatorRequest::ApplyDisplayModeNow { mode } => {
                let response = match self.coordinator.apply_preference(mode).await {
                    Ok(mode) => ApplyResponse { ok: true, mode, error: None },
                    Err(e) => {
                        error!(mode = %mode, error = ?e, "Failed to apply display mode");
                        ApplyResponse { ok: false, mode, error: Some(format!("{e:#}")) }
                    }
                };
                CoordinatorResponse::Apply(response)
            }

            CoordinatorRequest::ActivateDisplayModeNow {
                mode,
                source_host,
                target_window_id,
                sender_tab_id,
            } => {
                let context = WindowContext {
                    requested_window_id: target_window_id,
                    sender_tab_id,
                };
                let result = self.coordinator.activate_now(mode, source_host, &context).await;
                let response = match result {
                    Ok(outcome) => ActivateResponse::from_outcome(mode, outcome),
                    Err(e) => {
                        error!(mode = %mode, error = %e, "Failed to activate display mode");
                        ActivateResponse::failed(mode, e.to_string())
                    }
                };
                CoordinatorResponse::Activate(response)
            }

            CoordinatorRequest::RunCommand { command, tab_id } => {
                let Some(parsed) = ShortcutCommand::parse(&command) else {
                    warn!(command = %command, "Unknown shortcut command");
                    let error = format!("Unknown command: {command}");
                    return CoordinatorResponse::Command(CommandResponse::failed(command, error));
                };
                let response = match self.commands.run(parsed, tab_id).await {
                    Ok(outcome) => CommandResponse::from_outcome(command, &outcome),
                    Err(e) => {
                        error!(command = %command, error = ?e, "Shortcut command failed");
                        CommandResponse::failed(command, format!("{e:#}"))
                    }
                };
                CoordinatorResponse::Command(response)
            }

            CoordinatorRequest::ToolbarClicked { tab_id } => {
                let tab = match tab_id {
                    Some(id) => self.host.tab(id).await.unwrap_or_else(|e| {
                        debug!(tab_id = id, error = %e, "Clicked tab lookup failed");
                        None
                    }),
                    None => None,
                };
                let response = match self.coordinator.handle_toolbar_click(tab).await {
                    Ok(()) => AckResponse::ok(),
                    Err(e) => {
                        error!(error = %e, "Toolbar click handling failed");
                        AckResponse::failed(e.to_string())
                    }
                };
                CoordinatorResponse::Ack(response)
            }

            CoordinatorRequest::Ping => CoordinatorResponse::Ack(AckResponse::ok()),
        }
    }
}

/// Accept connections until the listener fails, one task per connection
pub async fn serve(server: CoordinatorServer, handler: Arc<RequestHandler>) -> Result<()> {
    info!(socket = ?server.path(), "IPC listener started");

    loop {
        let stream = server.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, handler).await {
                warn!(error = ?e, "IPC connection closed with error");
            }
        });
    }
}

async fn handle_connection(mut stream: UnixStream, handler: Arc<RequestHandler>) -> Result<()> {
    debug!("Client connected");

    while let Some(frame) = read_frame(&mut stream).await? {
        let response = match serde_json::from_slice::<CoordinatorRequest>(&frame) {
            Ok(request) => {
                debug!(request = ?request, "Received IPC request");
                handler.handle(request).await
            }
            Err(e) => {
                warn!(error = %e, "Malformed IPC request");
                CoordinatorResponse::Ack(AckResponse::failed(format!("Malformed request: {e}")))
            }
        };
        write_message(&mut stream, &response).await?;
    }

    debug!("Client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::WindowSettings;
    use crate::display_mode::{DisplayMode, SourceHost};
    use crate::host::{HeadlessHost, HostCapabilities};
    use crate::ipc::{
        CoordinatorClient, notify_display_mode_applied, read_message,
        request_display_mode_activation,
    };
    use crate::migration::StorageMigrator;
    use crate::storage::{AreaName, MemoryArea, NewItem, SnippetStore, StorageArea, StorageAreas};
    use serde_json::{Value, json};
    use std::path::PathBuf;

    struct Daemon {
        _dir: tempfile::TempDir,
        socket: PathBuf,
        host: Arc<HeadlessHost>,
        store: SnippetStore,
    }

    fn start_daemon(capabilities: HostCapabilities) -> Daemon {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("coordinator.sock");

        let sync: Arc<dyn StorageArea> = Arc::new(MemoryArea::new(AreaName::Sync));
        let areas = StorageAreas::new(None, Some(sync.clone()));
        let store = SnippetStore::new(sync);
        let host = Arc::new(HeadlessHost::new(capabilities));
        let coordinator = Arc::new(SurfaceCoordinator::new(
            host.clone(),
            store.clone(),
            WindowSettings { width: 440, height: 760 },
        ));
        let migrator = StorageMigrator::new(&areas);
        let commands = CommandRunner::new(store.clone(), host.clone(), host.clone(), migrator);
        let handler = Arc::new(RequestHandler::new(coordinator, commands, host.clone()));

        let server = CoordinatorServer::bind_to(socket.clone()).unwrap();
        tokio::spawn(serve(server, handler));

        Daemon {
            _dir: dir,
            socket,
            host,
            store,
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let daemon = start_daemon(HostCapabilities::default());
        let mut client = CoordinatorClient::connect_to(&daemon.socket).await.unwrap();

        let response: AckResponse = client.request(&CoordinatorRequest::Ping).await.unwrap();

        assert_eq!(response, AckResponse::ok());
    }

    #[tokio::test]
    async fn test_apply_display_mode_persists() {
        let daemon = start_daemon(HostCapabilities::default());

        assert!(notify_display_mode_applied(&daemon.socket, DisplayMode::Popup).await);

        assert_eq!(daemon.store.display_mode().await.unwrap(), DisplayMode::Popup);
        let snapshot = daemon.host.snapshot().await;
        assert!(!snapshot.open_panel_on_action_click);
        assert_eq!(snapshot.popup, "popup.html?displayHost=action-popup");
    }

    #[tokio::test]
    async fn test_activate_window_from_popup() {
        let daemon = start_daemon(HostCapabilities::default());

        let response = request_display_mode_activation(
            &daemon.socket,
            DisplayMode::Window,
            SourceHost::ActionPopup,
            None,
            None,
        )
        .await
        .unwrap();

        assert!(response.ok);
        assert!(response.applied_now);
        assert!(response.should_close_current_surface);
        assert_eq!(response.blocked_by_user_gesture, None);
        assert_eq!(daemon.host.snapshot().await.standalone_windows.len(), 1);
    }

    #[tokio::test]
    async fn test_activate_attached_without_side_panel() {
        let daemon = start_daemon(HostCapabilities {
            side_panel: false,
            ..HostCapabilities::default()
        });

        let response = request_display_mode_activation(
            &daemon.socket,
            DisplayMode::Attached,
            SourceHost::Window,
            None,
            None,
        )
        .await
        .unwrap();

        assert!(response.ok);
        assert!(!response.applied_now);
        assert!(!response.should_close_current_surface);
    }

    #[tokio::test]
    async fn test_run_command_over_socket() {
        let daemon = start_daemon(HostCapabilities::default());
        let item = daemon.store.add_item(NewItem::new("Hi", "Hello!")).await.unwrap();
        let tab_id = daemon.host.active_tab().await.unwrap().unwrap().id;
        let mut client = CoordinatorClient::connect_to(&daemon.socket).await.unwrap();

        let response: CommandResponse = client
            .request(&CoordinatorRequest::RunCommand {
                command: "insert-last-used-snippet".to_string(),
                tab_id: None,
            })
            .await
            .unwrap();
        assert!(response.inserted);
        assert_eq!(response.item_id, Some(item.id));
        assert_eq!(daemon.host.field_text(tab_id).await.as_deref(), Some("Hello!"));

        let response: CommandResponse = client
            .request(&CoordinatorRequest::RunCommand {
                command: "open-everything".to_string(),
                tab_id: None,
            })
            .await
            .unwrap();
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("Unknown command: open-everything"));
    }

    #[tokio::test]
    async fn test_toolbar_click_in_window_mode() {
        let daemon = start_daemon(HostCapabilities::default());
        assert!(notify_display_mode_applied(&daemon.socket, DisplayMode::Window).await);
        let tab = daemon.host.active_tab().await.unwrap().unwrap();
        let mut client = CoordinatorClient::connect_to(&daemon.socket).await.unwrap();

        let response: AckResponse = client
            .request(&CoordinatorRequest::ToolbarClicked { tab_id: Some(tab.id) })
            .await
            .unwrap();

        assert!(response.ok);
        let windows = daemon.host.snapshot().await.standalone_windows;
        assert_eq!(windows.len(), 1);
        assert_eq!(
            windows[0].url,
            format!(
                "popup.html?displayHost=window&targetTabId={}&targetWindowId={}",
                tab.id, tab.window_id
            )
        );
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_connection() {
        let daemon = start_daemon(HostCapabilities::default());
        let mut stream = UnixStream::connect(&daemon.socket).await.unwrap();

        write_message(&mut stream, &json!({ "type": "reboot" })).await.unwrap();
        let response: Value = read_message(&mut stream).await.unwrap();
        assert_eq!(response["ok"], json!(false));
        assert!(response["error"].as_str().unwrap().starts_with("Malformed request"));

        write_message(&mut stream, &json!({ "type": "ping" })).await.unwrap();
        let response: Value = read_message(&mut stream).await.unwrap();
        assert_eq!(response, json!({ "ok": true }));
    }
}
