//! IPC message types for surface ↔ coordinator communication

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::commands::CommandOutcome;
use crate::coordinator::ActivationOutcome;
use crate::display_mode::{DisplayMode, SourceHost};

/// Requests sent from a UI surface (or the CLI) to the coordinator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CoordinatorRequest {
    /// The preference was changed; persist it and apply it as the default
    ApplyDisplayModeNow {
        #[serde(default)]
        mode: DisplayMode,
    },

    /// Switch surfaces right now on behalf of the requesting surface
    #[serde(rename_all = "camelCase")]
    ActivateDisplayModeNow {
        #[serde(default)]
        mode: DisplayMode,
        #[serde(default)]
        source_host: SourceHost,
        #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
        target_window_id: Option<i64>,
        #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
        sender_tab_id: Option<i64>,
    },

    /// Keyboard shortcut fired
    #[serde(rename_all = "camelCase")]
    RunCommand {
        command: String,
        #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
        tab_id: Option<i64>,
    },

    /// Toolbar icon clicked with no default surface configured
    #[serde(rename_all = "camelCase")]
    ToolbarClicked {
        #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
        tab_id: Option<i64>,
    },

    /// Health check
    Ping,
}

/// Integer ids only; anything else is treated as absent
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_i64())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub ok: bool,
    pub mode: DisplayMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    pub ok: bool,
    pub mode: DisplayMode,
    pub applied_now: bool,
    pub should_close_current_surface: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by_user_gesture: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActivateResponse {
    pub fn from_outcome(mode: DisplayMode, outcome: ActivationOutcome) -> Self {
        Self {
            ok: true,
            mode,
            applied_now: outcome.applied_now,
            should_close_current_surface: outcome.should_close_current_surface,
            blocked_by_user_gesture: outcome.blocked_by_user_gesture.then_some(true),
            error: None,
        }
    }

    pub fn failed(mode: DisplayMode, error: String) -> Self {
        Self {
            ok: false,
            mode,
            applied_now: false,
            should_close_current_surface: false,
            blocked_by_user_gesture: None,
            error: Some(error),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub ok: bool,
    pub command: String,
    pub inserted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn from_outcome(command: String, outcome: &CommandOutcome) -> Self {
        Self {
            ok: true,
            command,
            inserted: outcome.is_inserted(),
            item_id: outcome.item_id().map(str::to_string),
            reason: outcome.reason().map(str::to_string),
            error: None,
        }
    }

    pub fn failed(command: String, error: String) -> Self {
        Self {
            ok: false,
            command,
            inserted: false,
            item_id: None,
            reason: None,
            error: Some(error),
        }
    }
}

/// Plain acknowledgment (ping, toolbar click, malformed requests)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}

/// Any reply the coordinator sends; serialized without a wrapper
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CoordinatorResponse {
    Apply(ApplyResponse),
    Activate(ActivateResponse),
    Command(CommandResponse),
    Ack(AckResponse),
}
