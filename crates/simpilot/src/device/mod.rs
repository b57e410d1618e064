use serde::Deserialize;
use simpilot_common::{
    runtime_display_name, validate, Device, DeviceFilter, DeviceState, SimError, Udid,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::exec::{ProcessRunner, Tools};

/// Raw simctl JSON output structures for devices
#[derive(Debug, Deserialize)]
struct SimctlDeviceList {
    devices: HashMap<String, Vec<SimctlDevice>>,
}

#[derive(Debug, Deserialize)]
struct SimctlDevice {
    #[serde(default)]
    udid: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "deviceTypeIdentifier", default)]
    device_type_identifier: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(rename = "isAvailable", default)]
    is_available: Option<bool>,
}

/// Parse `simctl list devices --json` output. Devices come back sorted by
/// runtime, then name.
pub fn parse_device_list(json: &str) -> Result<Vec<Device>, SimError> {
    let list: SimctlDeviceList = serde_json::from_str(json).map_err(|e| SimError::Parse {
        what: "simctl device list",
        detail: e.to_string(),
    })?;

    let mut devices = Vec::new();
    for (runtime_id, runtime_devices) in list.devices {
        let runtime_name = runtime_display_name(&runtime_id);

        for device in runtime_devices {
            devices.push(Device {
                udid: device.udid,
                name: device.name,
                device_type_identifier: device.device_type_identifier.unwrap_or_default(),
                runtime_identifier: runtime_id.clone(),
                runtime: runtime_name.clone(),
                state: DeviceState::from_simctl(&device.state),
                is_available: device.is_available.unwrap_or(true),
            });
        }
    }

    devices.sort_by(|a, b| a.runtime.cmp(&b.runtime).then_with(|| a.name.cmp(&b.name)));
    Ok(devices)
}

/// List all simulator devices
pub async fn list_devices<R: ProcessRunner + ?Sized>(
    runner: &R,
    tools: &Tools,
) -> Result<Vec<Device>, SimError> {
    let inv = tools.simctl(["list", "devices", "--json"]).build();
    let output = runner
        .run(&inv)
        .await
        .map_err(|e| SimError::process("simctl list devices failed", e))?;
    parse_device_list(&output.stdout)
}

/// List devices matching every criterion of `filter`
pub async fn find_devices<R: ProcessRunner + ?Sized>(
    runner: &R,
    tools: &Tools,
    filter: &DeviceFilter,
) -> Result<Vec<Device>, SimError> {
    Ok(filter.apply(list_devices(runner, tools).await?))
}

/// Decides which simulator a command targets.
///
/// Order: explicit `--device`, then the environment default, then the one
/// booted simulator. The result is cached for the life of the resolver.
#[derive(Debug, Default)]
pub struct DeviceResolver {
    explicit: Option<String>,
    env_default: Option<String>,
    resolved: OnceLock<Udid>,
}

impl DeviceResolver {
    pub fn new(explicit: Option<String>, env_default: Option<String>) -> Self {
        Self {
            explicit: explicit.filter(|s| !s.is_empty()),
            env_default: env_default.filter(|s| !s.is_empty()),
            resolved: OnceLock::new(),
        }
    }

    pub async fn resolve<R: ProcessRunner + ?Sized>(
        &self,
        runner: &R,
        tools: &Tools,
    ) -> Result<Udid, SimError> {
        if let Some(udid) = self.resolved.get() {
            return Ok(udid.clone());
        }

        let udid = if let Some(ref explicit) = self.explicit {
            validate::udid(explicit)?
        } else if let Some(ref default) = self.env_default {
            debug!("Using default device from environment: {}", default);
            validate::udid(default)?
        } else {
            booted_device(runner, tools).await?
        };

        Ok(self.resolved.get_or_init(|| udid).clone())
    }
}

async fn booted_device<R: ProcessRunner + ?Sized>(
    runner: &R,
    tools: &Tools,
) -> Result<Udid, SimError> {
    let booted: Vec<Device> = list_devices(runner, tools)
        .await?
        .into_iter()
        .filter(Device::is_booted)
        .collect();

    match booted.as_slice() {
        [] => Err(SimError::SimulatorNotFound("No booted simulator found".to_string())),
        [device] => {
            debug!("Using booted simulator {} ({})", device.name, device.udid);
            Ok(validate::udid(&device.udid)?)
        }
        many => Err(SimError::AmbiguousDevice(
            many.iter().map(|d| format!("{} ({})", d.name, d.udid)).collect(),
        )),
    }
}
