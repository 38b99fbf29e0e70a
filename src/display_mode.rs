//! Presentation mode preference and surface identity

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// User's preferred presentation mode
///
/// Stored values other than `popup` / `window` read back as `Attached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    #[default]
    Attached,
    Popup,
    Window,
}

impl DisplayMode {
    pub fn normalize(raw: &Value) -> Self {
        raw.as_str().map(Self::from_str_lossy).unwrap_or_default()
    }

    pub fn from_str_lossy(raw: &str) -> Self {
        match raw.trim() {
            "popup" => DisplayMode::Popup,
            "window" => DisplayMode::Window,
            _ => DisplayMode::Attached,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Attached => "attached",
            DisplayMode::Popup => "popup",
            DisplayMode::Window => "window",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DisplayMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

/// Kind of UI surface that sent a request
///
/// The attached panel page carries no host marker, so anything unrecognized
/// is treated as the attached surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceHost {
    #[default]
    Attached,
    ActionPopup,
    Window,
}

impl SourceHost {
    pub fn from_str_lossy(raw: &str) -> Self {
        match raw.trim() {
            "action-popup" => SourceHost::ActionPopup,
            "window" => SourceHost::Window,
            _ => SourceHost::Attached,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceHost::Attached => "attached",
            SourceHost::ActionPopup => "action-popup",
            SourceHost::Window => "window",
        }
    }
}

impl fmt::Display for SourceHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceHost {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(Self::from_str_lossy).unwrap_or_default())
    }
}
