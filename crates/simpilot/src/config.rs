use anyhow::{bail, Context, Result};
use simpilot_common::{validate, CliConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("simpilot")
        .join("config.toml")
}

pub fn resolve_path(path: &Option<PathBuf>) -> PathBuf {
    path.clone().unwrap_or_else(default_config_path)
}

/// Load configuration from file or return defaults
pub fn load_config(path: &Option<PathBuf>) -> Result<CliConfig> {
    let config_path = resolve_path(path);

    if config_path.exists() {
        debug!("Loading config from {:?}", config_path);
        let content = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: CliConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    } else {
        debug!("Config file not found, using defaults");
        Ok(CliConfig::default())
    }
}

/// Save configuration to file
pub fn save_config(config: &CliConfig, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(config_path, content).context("Failed to write config file")?;
    Ok(())
}

/// Set one `section.key` value
pub fn set_value(config: &mut CliConfig, key: &str, value: &str) -> Result<()> {
    let Some((section, field)) = key.split_once('.') else {
        bail!("Invalid key format. Use 'section.key' (e.g., 'defaults.timeout_secs')");
    };

    match (section, field) {
        ("tools", "xcrun") => config.tools.xcrun = value.to_string(),
        ("tools", "idb") => config.tools.idb = value.to_string(),
        ("tools", "sips") => config.tools.sips = value.to_string(),
        ("tools", "open") => config.tools.open = value.to_string(),

        ("defaults", "device") if value.is_empty() => config.defaults.device = None,
        ("defaults", "device") => {
            config.defaults.device = Some(validate::udid(value)?.to_string());
        }
        ("defaults", "output_dir") => config.defaults.output_dir = value.into(),
        ("defaults", "timeout_secs") => {
            config.defaults.timeout_secs =
                value.parse().context("timeout_secs must be a whole number")?;
        }
        ("defaults", "view_quality") => {
            let quality: u8 = value.parse().context("view_quality must be 1-100")?;
            config.defaults.view_quality = validate::quality(quality)?;
        }

        ("recording", "state_file") if value.is_empty() => config.recording.state_file = None,
        ("recording", "state_file") => config.recording.state_file = Some(value.into()),

        _ => bail!("Unknown config key: {}", key),
    }
    Ok(())
}

/// Generate default config content for `config init`
pub fn generate_default_config() -> String {
    r#"# simpilot configuration

[tools]
# Device-control utility front end (runs `simctl`)
xcrun = "xcrun"

# UI-automation bridge
idb = "idb"

# Image conversion, used by `view --format jpeg`
sips = "sips"

# Used to bring the Simulator app to the front
open = "open"

[defaults]
# Device UDID used when neither --device nor SIMPILOT_DEVICE is set
# device = "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"

# Where screenshots and recordings go when no output path is given
output_dir = "."

# Timeout for blocking tool calls, in seconds
timeout_secs = 30

# JPEG quality for `view`
view_quality = 80

[recording]
# Active recording descriptor (defaults to the system temp directory)
# state_file = "/tmp/simpilot-recording.json"
"#
    .to_string()
}
