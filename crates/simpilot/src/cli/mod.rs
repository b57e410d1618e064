pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::output::OutputMode;

/// Environment variable holding the default device UDID
pub const DEVICE_ENV: &str = "SIMPILOT_DEVICE";

#[derive(Parser)]
#[command(name = "simpilot")]
#[command(about = "Drive iOS simulators: input, capture, apps and notifications")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SIMPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target device UDID (defaults to $SIMPILOT_DEVICE, then the booted simulator)
    #[arg(short, long, global = true)]
    pub device: Option<String>,

    /// Directory for screenshots and recordings without an explicit path
    #[arg(long, global = true, env = "SIMPILOT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Timeout for tool calls, in seconds
    #[arg(
        long,
        global = true,
        env = "SIMPILOT_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, global = true, env = "SIMPILOT_VERBOSE")]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true, env = "SIMPILOT_QUIET")]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// JSON output with invocation metadata (implies --json)
    #[arg(long, global = true, env = "SIMPILOT_MACHINE")]
    pub machine: bool,

    /// Output format
    #[arg(
        long,
        global = true,
        env = "SIMPILOT_FORMAT",
        value_enum,
        default_value_t = Format::Human
    )]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.machine {
            OutputMode::Machine
        } else if self.json || self.format == Format::Json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Default device from the environment, ignoring empty values
pub fn env_device() -> Option<String> {
    std::env::var(DEVICE_ENV).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect, boot and list simulators
    Device {
        #[command(subcommand)]
        command: DeviceCommands,
    },

    /// Tap at a screen position
    Tap {
        #[arg(allow_hyphen_values = true)]
        x: String,
        #[arg(allow_hyphen_values = true)]
        y: String,
        /// Hold duration in seconds
        #[arg(long, allow_hyphen_values = true)]
        duration: Option<String>,
    },

    /// Type text into the focused field
    Type {
        #[arg(allow_hyphen_values = true)]
        text: String,
    },

    /// Swipe between two points
    Swipe {
        #[arg(allow_hyphen_values = true)]
        x1: String,
        #[arg(allow_hyphen_values = true)]
        y1: String,
        #[arg(allow_hyphen_values = true)]
        x2: String,
        #[arg(allow_hyphen_values = true)]
        y2: String,
        /// Swipe duration in seconds
        #[arg(long, allow_hyphen_values = true)]
        duration: Option<String>,
        /// Step size in points
        #[arg(long)]
        delta: Option<u32>,
    },

    /// Press a hardware button (home, lock, power, volume-up, volume-down, ringer, home+lock)
    Press { button: String },

    /// Dump the accessibility tree
    Inspect {
        /// Save the tree to a file
        #[arg(short, long)]
        output: Option<String>,
        /// Presentation: json, tree or table
        #[arg(long)]
        format: Option<String>,
    },

    /// Describe the element at a screen position
    InspectPoint {
        #[arg(allow_hyphen_values = true)]
        x: String,
        #[arg(allow_hyphen_values = true)]
        y: String,
    },

    /// Capture the screen sized for viewing, to a file or inline base64
    View {
        #[arg(short, long)]
        output: Option<String>,
        /// png or jpeg
        #[arg(long)]
        format: Option<String>,
        /// JPEG quality, 1-100
        #[arg(long)]
        quality: Option<u8>,
    },

    /// Take a screenshot
    Screenshot {
        #[arg(short, long)]
        output: Option<String>,
        /// Image type: png, tiff, bmp, gif or jpeg
        #[arg(long = "type")]
        image_type: Option<String>,
        /// internal or external
        #[arg(long)]
        display: Option<String>,
        /// ignored, alpha or black
        #[arg(long)]
        mask: Option<String>,
    },

    /// Start recording the screen in the background
    Record {
        #[arg(short, long)]
        output: Option<String>,
        /// h264 or hevc
        #[arg(long)]
        codec: Option<String>,
        #[arg(long)]
        display: Option<String>,
        #[arg(long)]
        mask: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Stop the active recording
    RecordStop,

    /// Install an .app bundle or .ipa archive
    Install { path: String },

    /// Launch an installed app
    Launch {
        bundle_id: String,
        /// Terminate a running instance first
        #[arg(long)]
        terminate: bool,
    },

    /// Uninstall an app
    Uninstall { bundle_id: String },

    /// List installed apps
    AppList,

    /// Send a push notification
    Notify(NotifyArgs),

    /// Send a title/body notification
    NotifySimple {
        bundle_id: String,
        title: String,
        body: String,
        #[arg(long)]
        subtitle: Option<String>,
    },

    /// Send a recognizable test notification
    NotifyTest { bundle_id: String },

    /// Send a background (content-available) notification
    NotifySilent {
        bundle_id: String,
        /// Custom data as key=value (repeatable)
        #[arg(long = "data")]
        data: Vec<String>,
    },

    /// Set the app icon badge
    NotifyBadge {
        bundle_id: String,
        #[arg(allow_hyphen_values = true)]
        count: i64,
    },

    /// Clear the app icon badge
    ClearBadge { bundle_id: String },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum DeviceCommands {
    /// Show the targeted device
    Info,

    /// Boot a device and open the Simulator app
    Open {
        /// Device UDID (otherwise chosen by filters)
        udid: Option<String>,
        /// iOS version substring, e.g. "17.2"
        #[arg(long)]
        ios: Option<String>,
        /// Device name substring, e.g. "iPhone 15"
        #[arg(long)]
        name: Option<String>,
    },

    /// List devices grouped by runtime
    List {
        #[arg(long)]
        ios: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Only booted devices
        #[arg(long)]
        booted: bool,
    },
}

#[derive(clap::Args)]
pub struct NotifyArgs {
    pub bundle_id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub subtitle: Option<String>,
    #[arg(long)]
    pub body: Option<String>,
    #[arg(long)]
    pub badge: Option<i64>,
    #[arg(long)]
    pub sound: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub thread_id: Option<String>,
    /// Custom data as key=value (repeatable)
    #[arg(long = "data")]
    pub data: Vec<String>,
    /// Full payload as a JSON string
    #[arg(long)]
    pub payload: Option<String>,
    /// Read the payload from a JSON file
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize configuration file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., defaults.timeout_secs, tools.idb)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_machine_implies_json() {
        let cli = Cli::try_parse_from(["simpilot", "--machine", "app-list"]).unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Machine);

        let cli = Cli::try_parse_from(["simpilot", "--json", "app-list"]).unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Json);
    }

    #[test]
    fn test_negative_coordinate_reaches_validator() {
        let cli = Cli::try_parse_from(["simpilot", "tap", "-5", "10"]).unwrap();
        assert!(matches!(cli.command, Commands::Tap { ref x, .. } if x == "-5"));
    }

    #[test]
    #[serial]
    fn test_env_device() {
        std::env::set_var(DEVICE_ENV, "5B8C7A3E-1D2F-4E6A-9B0C-112233445566");
        assert_eq!(env_device().as_deref(), Some("5B8C7A3E-1D2F-4E6A-9B0C-112233445566"));
        std::env::set_var(DEVICE_ENV, "  ");
        assert_eq!(env_device(), None);
        std::env::remove_var(DEVICE_ENV);
        assert_eq!(env_device(), None);
    }

    #[test]
    #[serial]
    fn test_format_from_env() {
        std::env::set_var("SIMPILOT_FORMAT", "json");
        let cli = Cli::try_parse_from(["simpilot", "record-stop"]).unwrap();
        std::env::remove_var("SIMPILOT_FORMAT");
        assert_eq!(cli.output_mode(), OutputMode::Json);
    }
}
