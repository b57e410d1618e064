use serde::{Deserialize, Serialize};
use std::fmt;

const RUNTIME_PREFIX: &str = "com.apple.CoreSimulator.SimRuntime.";

/// A validated simulator identifier (8-4-4-4-12 hex groups).
///
/// Only constructed through [`crate::validate::udid`], so holding one means the
/// value is safe to hand to a process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Udid(String);

impl Udid {
    pub(crate) fn new_unchecked(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Udid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Udid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A simulator device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    /// Device UDID
    pub udid: String,
    /// Device name (e.g., "iPhone 15 Pro")
    pub name: String,
    /// Device type identifier
    pub device_type_identifier: String,
    /// Runtime identifier
    pub runtime_identifier: String,
    /// Human-readable runtime (e.g., "iOS 17.0")
    pub runtime: String,
    /// Current state
    pub state: DeviceState,
    /// Whether device is available
    pub is_available: bool,
}

impl Device {
    pub fn is_booted(&self) -> bool {
        self.state == DeviceState::Booted
    }
}

/// Simulator device state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceState {
    #[default]
    Shutdown,
    Booted,
    Creating,
    Booting,
    ShuttingDown,
}

impl DeviceState {
    /// Parse the state string reported by simctl ("Booted", "Shutting Down", ...)
    pub fn from_simctl(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "booted" => Self::Booted,
            "booting" => Self::Booting,
            "creating" => Self::Creating,
            "shuttingdown" | "shutting down" | "shutting-down" => Self::ShuttingDown,
            _ => Self::Shutdown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::Booted => "booted",
            Self::Creating => "creating",
            Self::Booting => "booting",
            Self::ShuttingDown => "shutting-down",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn "com.apple.CoreSimulator.SimRuntime.iOS-17-0" into "iOS 17.0"
pub fn runtime_display_name(runtime_id: &str) -> String {
    let short = runtime_id.strip_prefix(RUNTIME_PREFIX).unwrap_or(runtime_id);
    match short.split_once('-') {
        Some((platform, version)) => format!("{} {}", platform, version.replace('-', ".")),
        None => short.to_string(),
    }
}

/// Device list filter. All set criteria must match.
///
/// Substring checks are literal and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Substring of the runtime name, e.g. "17.2" or "iOS 18"
    pub ios_version: Option<String>,
    /// Substring of the device name, e.g. "iPhone 15"
    pub name: Option<String>,
    pub booted_only: bool,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        if self.booted_only && !device.is_booted() {
            return false;
        }
        if let Some(ref version) = self.ios_version {
            if !device.runtime.contains(version.as_str()) {
                return false;
            }
        }
        if let Some(ref name) = self.name {
            if !device.name.contains(name.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, devices: Vec<Device>) -> Vec<Device> {
        devices.into_iter().filter(|d| self.matches(d)).collect()
    }
}
