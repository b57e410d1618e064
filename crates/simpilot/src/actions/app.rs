use serde_json::json;
use simpilot_common::{classify_exec, parse_app_listing, ErrorKind, ListingStrategy, SimError};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::context::Context;
use crate::exec::ProcessRunner;
use crate::outcome::Outcome;

/// Bundle forms simctl installs
const BUNDLE_EXTENSIONS: &[&str] = &["app", "ipa"];

/// Resolve and check an app bundle path without touching any process
fn check_bundle(path: &Path) -> Result<PathBuf, SimError> {
    let path = std::path::absolute(path)?;
    if !path.exists() {
        return Err(SimError::FileNotFound(path));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !BUNDLE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(SimError::InvalidBundle {
            path,
            reason: "expected a .app bundle or an .ipa archive".to_string(),
        });
    }
    if extension == "app" && !path.is_dir() {
        return Err(SimError::InvalidBundle {
            path,
            reason: "a .app bundle must be a directory".to_string(),
        });
    }
    Ok(path)
}

pub async fn install<R: ProcessRunner>(
    ctx: &Context<R>,
    path: PathBuf,
) -> Result<Outcome, SimError> {
    let path = check_bundle(&path)?;
    let udid = ctx.device().await?;

    let inv = ctx
        .tools
        .simctl(["install"])
        .operands([udid.to_string(), path.display().to_string()]);
    ctx.run(&inv, "simctl install failed").await?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(Outcome::done(format!("Installed {}", name)).with("path", path.display().to_string()))
}

/// Pid from `com.example.app: 12345`
fn parse_launch_pid(stdout: &str) -> Option<u32> {
    let line = stdout.lines().next()?;
    let tail = line.rsplit(':').next()?.trim_start();
    let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

pub async fn launch<R: ProcessRunner>(
    ctx: &Context<R>,
    bundle_id: String,
    terminate: bool,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let inv = ctx
        .tools
        .simctl(["launch"])
        .flag_if("--terminate-running-process", terminate)
        .operands([udid.as_str(), bundle_id.as_str()]);
    let output = ctx.run(&inv, "simctl launch failed").await?;

    let pid = parse_launch_pid(&output.stdout);
    let summary = match pid {
        Some(pid) => format!("Launched {} (pid {})", bundle_id, pid),
        None => format!("Launched {}", bundle_id),
    };
    Ok(Outcome::done(summary)
        .with("bundle_id", bundle_id)
        .with("pid", json!(pid)))
}

pub async fn uninstall<R: ProcessRunner>(
    ctx: &Context<R>,
    bundle_id: String,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let inv = ctx
        .tools
        .simctl(["uninstall"])
        .operands([udid.as_str(), bundle_id.as_str()]);

    match ctx.runner.run(&inv).await {
        Ok(_) => {
            Ok(Outcome::done(format!("Uninstalled {}", bundle_id)).with("bundle_id", bundle_id))
        }
        Err(e) if classify_exec(&e) == ErrorKind::FileNotFound => {
            Err(SimError::AppNotFound { bundle_id })
        }
        Err(e) => Err(SimError::process("simctl uninstall failed", e)),
    }
}

pub async fn list<R: ProcessRunner>(ctx: &Context<R>) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let inv = ctx.tools.simctl(["listapps"]).operands([udid.as_str()]);
    let output = ctx.run(&inv, "simctl listapps failed").await?;

    let (apps, strategy) = parse_app_listing(&output.stdout);
    if strategy == ListingStrategy::Positional {
        warn!("App listing did not parse, names were paired by position");
    }

    let width = apps.iter().map(|a| a.bundle_id.len()).max().unwrap_or(0);
    let body = apps
        .iter()
        .map(|app| format!("{:<width$}  {}", app.bundle_id, app.name.as_deref().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Outcome::done(format!("{} apps installed", apps.len()))
        .with("count", apps.len())
        .with("strategy", json!(strategy))
        .with("apps", json!(apps))
        .with_body(body))
}
