//! Command line interface
//!
//! `serve` runs the coordinator daemon. Data subcommands work directly on the
//! storage files; `activate` and `run` need the daemon because they drive
//! surfaces and tabs.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bindings::SlotKey;
use crate::commands::CommandRunner;
use crate::config::Config;
use crate::coordinator::SurfaceCoordinator;
use crate::display_mode::{DisplayMode, SourceHost};
use crate::host::HeadlessHost;
use crate::ipc::{
    self, CommandResponse, CoordinatorClient, CoordinatorRequest, CoordinatorServer, RequestHandler,
};
use crate::migration::StorageMigrator;
use crate::storage::{ItemError, ItemPatch, NewItem, SnippetStore, StorageAreas};

const MODES: [&str; 3] = ["attached", "popup", "window"];
const SOURCES: [&str; 3] = ["attached", "action-popup", "window"];

#[derive(Parser, Debug)]
#[command(name = "quickfill")]
#[command(about = "Text snippet quick-fill coordinator", version)]
pub struct Cli {
    /// Config file (default: ~/.config/quickfill/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the coordinator daemon
    Serve,
    /// Show or change the display mode preference
    Mode {
        #[command(subcommand)]
        action: ModeAction,
    },
    /// Ask the running daemon to switch surfaces right now
    Activate {
        #[arg(value_parser = MODES)]
        mode: String,
        /// Surface making the request
        #[arg(long, default_value = "attached", value_parser = SOURCES)]
        source: String,
        #[arg(long)]
        window: Option<i64>,
        #[arg(long)]
        tab: Option<i64>,
    },
    /// Bind an item to a shortcut slot (slot-1 .. slot-10)
    Bind { slot: String, item_id: String },
    /// Clear a shortcut slot
    Unbind { slot: String },
    /// Show all shortcut slots
    Bindings,
    /// Add a snippet item
    Add {
        title: String,
        content: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Change fields of an existing item
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List snippet items
    List,
    /// Delete a snippet item and release its slot
    Delete { id: String },
    /// Copy legacy local data into the synced area if it is empty
    Migrate,
    /// Run a shortcut command through the daemon
    Run {
        command: String,
        #[arg(long)]
        tab: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModeAction {
    Get,
    Set {
        #[arg(value_parser = MODES)]
        mode: String,
    },
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Activate { mode, source, window, tab } => {
            let mode = DisplayMode::from_str_lossy(&mode);
            let source = SourceHost::from_str_lossy(&source);
            activate(&config, mode, source, window, tab).await
        }
        Command::Run { command, tab } => run_command(&config, command, tab).await,
        Command::Migrate => {
            let areas = open_areas(&config)?;
            if StorageMigrator::new(&areas).migrate().await? {
                println!("Legacy data copied into synced storage");
            } else {
                println!("Nothing to migrate");
            }
            Ok(())
        }
        command => {
            let store = open_store(&config).await?;
            run_data_command(&config, &store, command).await
        }
    }
}

fn open_areas(config: &Config) -> Result<StorageAreas> {
    let data_dir = config.data_dir()?;
    Ok(StorageAreas::open(&data_dir, config.sync_enabled))
}

/// Default storage area, after the same migration a UI surface runs on open
async fn open_store(config: &Config) -> Result<SnippetStore> {
    let areas = open_areas(config)?;
    StorageMigrator::new(&areas).migrate().await?;
    Ok(SnippetStore::new(areas.default_area()?))
}

async fn run_data_command(config: &Config, store: &SnippetStore, command: Command) -> Result<()> {
    match command {
        Command::Mode { action: ModeAction::Get } => {
            println!("{}", store.display_mode().await?);
        }
        Command::Mode { action: ModeAction::Set { mode } } => {
            let mode = store.set_display_mode(DisplayMode::from_str_lossy(&mode)).await?;
            println!("{mode}");
            if !ipc::notify_display_mode_applied(&config.socket_path()?, mode).await {
                warn!(mode = %mode, "Coordinator not reachable, preference applies on next start");
            }
        }
        Command::Bind { slot, item_id } => {
            let items = store.load_items().await?;
            let item_id = item_id.trim();
            if !items.iter().any(|item| item.id == item_id) {
                return Err(ItemError::NotFound(item_id.to_string()).into());
            }
            store.set_shortcut_binding_for_slot(&slot, Some(item_id)).await?;
            println!("{slot} -> {item_id}");
        }
        Command::Unbind { slot } => {
            store.set_shortcut_binding_for_slot(&slot, None).await?;
            println!("{slot} cleared");
        }
        Command::Bindings => {
            let bindings = store.shortcut_bindings().await?;
            for slot in SlotKey::all() {
                println!("{slot}\t{}\t{}", slot.command(), bindings.get(slot).unwrap_or("-"));
            }
        }
        Command::Add { title, content, category } => {
            let mut input = NewItem::new(title, content);
            if let Some(category) = category {
                input = input.with_category(category);
            }
            let item = store.add_item(input).await?;
            println!("{}", item.id);
        }
        Command::Edit { id, title, content, category } => {
            let item = store.update_item(&id, ItemPatch { title, content, category }).await?;
            println!("{}\t{}\t{}", item.id, item.category, item.title);
        }
        Command::List => {
            let items = store.load_items().await?;
            let bindings = store.shortcut_bindings().await?;
            let last_used = store.last_used_item_id().await?;
            for item in items {
                let slot = bindings
                    .find_slot_for_item(&item.id)
                    .map(|slot| slot.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let marker = if last_used.as_deref() == Some(item.id.as_str()) { "*" } else { " " };
                println!("{marker} {}\t{}\t{}\t{}", item.id, slot, item.category, item.title);
            }
        }
        Command::Delete { id } => {
            store.delete_item(&id).await?;
            println!("deleted {id}");
        }
        Command::Serve | Command::Activate { .. } | Command::Run { .. } | Command::Migrate => {
            bail!("not a storage command");
        }
    }
    Ok(())
}

async fn serve(config: &Config) -> Result<()> {
    let areas = open_areas(config)?;
    let migrator = StorageMigrator::new(&areas);
    if let Err(e) = migrator.migrate().await {
        error!(error = ?e, "Legacy storage migration failed");
    }

    let store = SnippetStore::new(areas.default_area()?);
    let host = Arc::new(HeadlessHost::new(config.capabilities));
    let coordinator = Arc::new(SurfaceCoordinator::new(
        host.clone(),
        store.clone(),
        config.window_settings(),
    ));

    if let Err(e) = coordinator.resync().await {
        error!(error = ?e, "Failed to read display mode, keeping default");
    }
    for changes in areas.subscribe_all() {
        tokio::spawn(coordinator.clone().watch_storage_changes(changes));
    }

    let commands = CommandRunner::new(store, host.clone(), host.clone(), migrator);
    let handler = Arc::new(RequestHandler::new(coordinator, commands, host));
    let server = CoordinatorServer::bind_to(config.socket_path()?)?;

    info!(capabilities = ?config.capabilities, "Coordinator running");
    tokio::select! {
        result = ipc::serve(server, handler) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn activate(
    config: &Config,
    mode: DisplayMode,
    source: SourceHost,
    window: Option<i64>,
    tab: Option<i64>,
) -> Result<()> {
    let socket = config.socket_path()?;
    let response = ipc::request_display_mode_activation(&socket, mode, source, window, tab).await;
    let Some(response) = response else {
        bail!("Coordinator not reachable at {}", socket.display());
    };
    if let Some(error) = &response.error {
        bail!("Activation failed: {error}");
    }

    println!(
        "applied_now={} should_close_current_surface={} blocked_by_user_gesture={}",
        response.applied_now,
        response.should_close_current_surface,
        response.blocked_by_user_gesture.unwrap_or(false)
    );
    Ok(())
}

async fn run_command(config: &Config, command: String, tab_id: Option<i64>) -> Result<()> {
    let socket = config.socket_path()?;
    let mut client = CoordinatorClient::connect_to(&socket).await?;
    let response: CommandResponse = client
        .request(&CoordinatorRequest::RunCommand { command, tab_id })
        .await?;

    if let Some(error) = response.error {
        bail!("{error}");
    }
    match (response.inserted, response.item_id, response.reason) {
        (true, Some(item_id), _) => println!("inserted {item_id}"),
        (_, _, Some(reason)) => println!("not inserted: {reason}"),
        _ => println!("not inserted"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn test_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().join("data")),
            socket_path: Some(dir.path().join("absent.sock")),
            ..Config::default()
        };
        (dir, config)
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let err = Cli::try_parse_from(["quickfill"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand);
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        let err = Cli::try_parse_from(["quickfill", "mode", "set", "sidebar"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_cli_parses_activate() {
        let cli = Cli::try_parse_from([
            "quickfill", "activate", "window", "--source", "action-popup", "--window", "3",
        ])
        .unwrap();

        match cli.command {
            Command::Activate { mode, source, window, tab } => {
                assert_eq!(mode, "window");
                assert_eq!(source, "action-popup");
                assert_eq!(window, Some(3));
                assert_eq!(tab, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::try_parse_from(["quickfill", "list", "--config", "/tmp/qf.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/qf.json")));
    }

    #[tokio::test]
    async fn test_add_bind_and_delete() {
        let (_dir, config) = test_config();
        let store = open_store(&config).await.unwrap();

        run_data_command(
            &config,
            &store,
            Command::Add {
                title: "Sig".to_string(),
                content: "Regards".to_string(),
                category: None,
            },
        )
        .await
        .unwrap();
        let id = store.load_items().await.unwrap()[0].id.clone();

        let bind = Command::Bind { slot: "slot-4".to_string(), item_id: id.clone() };
        run_data_command(&config, &store, bind).await.unwrap();
        assert_eq!(
            store.shortcut_bindings().await.unwrap().find_slot_for_item(&id),
            SlotKey::new(4)
        );

        run_data_command(&config, &store, Command::Delete { id: id.clone() }).await.unwrap();
        assert!(store.load_items().await.unwrap().is_empty());
        assert!(store.shortcut_bindings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_updates_fields() {
        let (_dir, config) = test_config();
        let store = open_store(&config).await.unwrap();
        let item = store.add_item(NewItem::new("Old", "text")).await.unwrap();

        run_data_command(
            &config,
            &store,
            Command::Edit {
                id: item.id.clone(),
                title: Some("New".to_string()),
                content: None,
                category: Some("Work".to_string()),
            },
        )
        .await
        .unwrap();

        let items = store.load_items().await.unwrap();
        assert_eq!(items[0].title, "New");
        assert_eq!(items[0].content, "text");
        assert_eq!(items[0].category, "Work");
    }

    #[tokio::test]
    async fn test_bind_rejects_unknown_item_and_slot() {
        let (_dir, config) = test_config();
        let store = open_store(&config).await.unwrap();
        let item = store.add_item(NewItem::new("A", "a")).await.unwrap();

        let err = run_data_command(
            &config,
            &store,
            Command::Bind { slot: "slot-1".to_string(), item_id: "nope".to_string() },
        )
        .await
        .unwrap_err();
        assert_eq!(err.downcast_ref::<ItemError>(), Some(&ItemError::NotFound("nope".to_string())));

        let err = run_data_command(
            &config,
            &store,
            Command::Bind { slot: "slot-11".to_string(), item_id: item.id },
        )
        .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_mode_set_without_daemon_still_persists() {
        let (_dir, config) = test_config();
        let store = open_store(&config).await.unwrap();

        let set = Command::Mode { action: ModeAction::Set { mode: "popup".to_string() } };
        run_data_command(&config, &store, set).await.unwrap();

        // A fresh handle reads the file-backed value
        let reopened = open_store(&config).await.unwrap();
        assert_eq!(reopened.display_mode().await.unwrap(), DisplayMode::Popup);
    }

    #[tokio::test]
    async fn test_activate_without_daemon_fails() {
        let (_dir, config) = test_config();
        let err = activate(&config, DisplayMode::Window, SourceHost::Window, None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Coordinator not reachable"));
    }
}
