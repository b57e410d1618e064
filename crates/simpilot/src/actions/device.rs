use serde_json::json;
use simpilot_common::{Device, DeviceFilter, DeviceState, SimError};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::context::Context;
use crate::device::{find_devices, list_devices};
use crate::exec::ProcessRunner;
use crate::outcome::Outcome;
use crate::request::OpenRequest;

fn device_json(device: &Device) -> serde_json::Value {
    serde_json::to_value(device).unwrap_or_default()
}

/// Details of the targeted device
pub async fn info<R: ProcessRunner>(ctx: &Context<R>) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let devices = list_devices(&ctx.runner, &ctx.tools).await?;

    let device = devices
        .iter()
        .find(|d| d.udid.eq_ignore_ascii_case(udid.as_str()))
        .ok_or_else(|| SimError::SimulatorNotFound(format!("Device {} not found", udid)))?;

    let body = [
        ("Name", device.name.as_str()),
        ("UDID", device.udid.as_str()),
        ("State", device.state.as_str()),
        ("Runtime", device.runtime.as_str()),
        ("Device type", device.device_type_identifier.as_str()),
        ("Available", if device.is_available { "yes" } else { "no" }),
    ]
    .iter()
    .map(|(key, value)| format!("{:<12} {}", format!("{}:", key), value))
    .collect::<Vec<_>>()
    .join("\n");

    Ok(Outcome::done(format!("{} ({})", device.name, device.state))
        .with("device", device_json(device))
        .with_body(body))
}

/// Boot a device in the background and bring the Simulator app forward
pub async fn open<R: ProcessRunner>(
    ctx: &Context<R>,
    request: OpenRequest,
) -> Result<Outcome, SimError> {
    let devices = list_devices(&ctx.runner, &ctx.tools).await?;

    let device = match request.udid {
        Some(ref udid) => devices
            .into_iter()
            .find(|d| d.udid.eq_ignore_ascii_case(udid.as_str()))
            .ok_or_else(|| SimError::SimulatorNotFound(format!("Device {} not found", udid)))?,
        None => pick_device(request.filter.apply(devices)).ok_or_else(|| {
            let filter = describe(&request.filter);
            SimError::SimulatorNotFound(format!("No available device matches {}", filter))
        })?,
    };
    let udid = simpilot_common::validate::udid(&device.udid)?;

    let already_booted = device.is_booted();
    if already_booted {
        debug!("{} is already booted", device.name);
    } else {
        let boot = ctx.tools.simctl(["boot"]).operands([udid.as_str()]);
        let process = ctx
            .runner
            .spawn_background(&boot)
            .await
            .map_err(|e| SimError::process("simctl boot failed", e))?;
        info!("Booting {} (pid {:?})", device.name, process.pid());
    }

    let open_app = ctx
        .tools
        .open()
        // `open --args` hands everything after it to the app, so no "--" here;
        // the UDID was checked against the 8-4-4-4-12 hex form above
        .args(["-a", "Simulator", "--args", "-CurrentDeviceUDID", udid.as_str()])
        .build();
    ctx.run(&open_app, "failed to open the Simulator app").await?;

    let summary = if already_booted {
        format!("Opened {} ({})", device.name, device.runtime)
    } else {
        format!("Booting {} ({})", device.name, device.runtime)
    };
    Ok(Outcome::done(summary)
        .with("device", device_json(&device))
        .with("booted", already_booted))
}

/// Prefer a booted device, then any available one
fn pick_device(candidates: Vec<Device>) -> Option<Device> {
    let mut available: Vec<Device> = candidates.into_iter().filter(|d| d.is_available).collect();
    available.sort_by_key(|d| !d.is_booted());
    available.into_iter().next()
}

fn describe(filter: &DeviceFilter) -> String {
    let mut parts = Vec::new();
    if let Some(ref version) = filter.ios_version {
        parts.push(format!("runtime '{}'", version));
    }
    if let Some(ref name) = filter.name {
        parts.push(format!("name '{}'", name));
    }
    if parts.is_empty() {
        "any filter".to_string()
    } else {
        parts.join(" and ")
    }
}

/// Devices grouped by runtime, with a summary line
pub async fn list<R: ProcessRunner>(
    ctx: &Context<R>,
    filter: &DeviceFilter,
) -> Result<Outcome, SimError> {
    let devices = find_devices(&ctx.runner, &ctx.tools, filter).await?;

    let mut by_runtime: BTreeMap<&str, Vec<&Device>> = BTreeMap::new();
    for device in &devices {
        by_runtime.entry(device.runtime.as_str()).or_default().push(device);
    }

    let mut lines = Vec::new();
    for (runtime, group) in &by_runtime {
        lines.push(format!("{}:", runtime));
        for device in group {
            let state_icon = match device.state {
                DeviceState::Booted => "🟢",
                DeviceState::Booting | DeviceState::ShuttingDown | DeviceState::Creating => "🟡",
                DeviceState::Shutdown => "⚪",
            };
            let available = if device.is_available { "" } else { " (unavailable)" };
            lines.push(format!("  {} {} [{}]{}", state_icon, device.name, device.udid, available));
        }
        lines.push(String::new());
    }

    let booted = devices.iter().filter(|d| d.is_booted()).count();
    let available = devices.iter().filter(|d| d.is_available).count();
    lines.push(format!(
        "Total: {} devices ({} available, {} booted)",
        devices.len(),
        available,
        booted
    ));

    Ok(Outcome::done(format!("{} devices", devices.len()))
        .with("devices", json!(devices))
        .with("count", devices.len())
        .with("available", available)
        .with("booted", booted)
        .with_body(lines.join("\n")))
}
