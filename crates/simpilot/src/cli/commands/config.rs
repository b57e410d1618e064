use anyhow::Result;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::cli::ConfigCommands;
use crate::config::{generate_default_config, load_config, resolve_path, save_config, set_value};
use crate::output::{OutputMode, Styles};

/// Run config management commands
pub fn run(command: ConfigCommands, path: &Option<PathBuf>, mode: OutputMode) -> Result<()> {
    let config_path = resolve_path(path);
    match command {
        ConfigCommands::Init { force } => init_config(&config_path, force, mode),
        ConfigCommands::Show => show_config(&config_path, mode),
        ConfigCommands::Set { key, value } => set_config(&config_path, &key, &value, mode),
    }
}

fn init_config(config_path: &Path, force: bool, mode: OutputMode) -> Result<()> {
    if config_path.exists() && !force {
        if mode.is_structured() {
            print_json(json!({"success": true, "status": "no_op", "path": config_path}));
        } else {
            let message = format!("Config file already exists at: {}", config_path.display());
            println!("{}", Styles::info(&message));
            println!("{}", Styles::dimmed("Use --force to overwrite."));
        }
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, generate_default_config())?;

    if mode.is_structured() {
        print_json(json!({"success": true, "status": "done", "path": config_path}));
    } else {
        println!("{}", Styles::success(&format!("Created config file: {}", config_path.display())));
    }
    Ok(())
}

fn show_config(config_path: &Path, mode: OutputMode) -> Result<()> {
    let config = load_config(&Some(config_path.to_path_buf()))?;

    if mode.is_structured() {
        print_json(json!({
            "success": true,
            "path": config_path,
            "exists": config_path.exists(),
            "config": config,
        }));
        return Ok(());
    }

    if config_path.exists() {
        println!("Config file: {}\n", config_path.display());
    } else {
        println!("No config file at {}, showing defaults.", config_path.display());
        println!("Run 'simpilot config init' to create one.\n");
    }

    println!("[tools]");
    println!("{}", Styles::kv("xcrun", &config.tools.xcrun));
    println!("{}", Styles::kv("idb", &config.tools.idb));
    println!("{}", Styles::kv("sips", &config.tools.sips));
    println!("{}", Styles::kv("open", &config.tools.open));

    println!("\n[defaults]");
    println!(
        "{}",
        Styles::kv("device", config.defaults.device.as_deref().unwrap_or("(booted simulator)"))
    );
    println!("{}", Styles::kv("output_dir", &config.defaults.output_dir.display().to_string()));
    println!("{}", Styles::kv("timeout_secs", &config.defaults.timeout_secs.to_string()));
    println!("{}", Styles::kv("view_quality", &config.defaults.view_quality.to_string()));

    println!("\n[recording]");
    let state_file = config
        .recording
        .state_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(temp directory)".to_string());
    println!("{}", Styles::kv("state_file", &state_file));

    Ok(())
}

fn set_config(config_path: &Path, key: &str, value: &str, mode: OutputMode) -> Result<()> {
    let mut config = load_config(&Some(config_path.to_path_buf()))?;
    set_value(&mut config, key, value)?;
    save_config(&config, config_path)?;

    if mode.is_structured() {
        print_json(json!({"success": true, "status": "done", "key": key, "value": value}));
    } else {
        println!("{}", Styles::success(&format!("Set {} = {}", key, value)));
    }
    Ok(())
}

fn print_json(value: serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    );
}
