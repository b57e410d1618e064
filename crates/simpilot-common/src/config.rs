use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CliConfig {
    /// External tool locations
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Defaults applied when a flag is not given
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Recording session settings
    #[serde(default)]
    pub recording: RecordingConfig,
}

/// Binaries the executor invokes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Device-control utility front end (runs `simctl`)
    #[serde(default = "default_xcrun")]
    pub xcrun: String,
    /// UI-automation bridge
    #[serde(default = "default_idb")]
    pub idb: String,
    /// Image conversion tool used by `view`
    #[serde(default = "default_sips")]
    pub sips: String,
    /// Used to bring the Simulator app to the front
    #[serde(default = "default_open")]
    pub open: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            xcrun: default_xcrun(),
            idb: default_idb(),
            sips: default_sips(),
            open: default_open(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    /// Device UDID used when no --device is given
    #[serde(default)]
    pub device: Option<String>,
    /// Where screenshots and recordings go when no path is given
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Timeout for blocking tool calls, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// JPEG quality for `view`
    #[serde(default = "default_view_quality")]
    pub view_quality: u8,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            device: None,
            output_dir: default_output_dir(),
            timeout_secs: default_timeout(),
            view_quality: default_view_quality(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordingConfig {
    /// Session descriptor location (defaults to the system temp dir)
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

// Default value functions
fn default_xcrun() -> String {
    "xcrun".to_string()
}

fn default_idb() -> String {
    "idb".to_string()
}

fn default_sips() -> String {
    "sips".to_string()
}

fn default_open() -> String {
    "open".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout() -> u64 {
    30
}

fn default_view_quality() -> u8 {
    80
}
