use chrono::Local;
use simpilot_common::{CliConfig, ExecError, ProcessFailure, SimError, Udid};
use std::path::PathBuf;
use std::time::Duration;

use crate::device::DeviceResolver;
use crate::exec::{Invocation, ProcessOutput, ProcessRunner, SystemRunner, Tools};
use crate::session::RecordingSlot;

/// Wait after interrupting a recorder so it can finalize the file
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// Everything an action needs for one invocation
pub struct Context<R: ProcessRunner = SystemRunner> {
    pub runner: R,
    pub tools: Tools,
    pub devices: DeviceResolver,
    pub output_dir: PathBuf,
    pub view_quality: u8,
    pub recording: RecordingSlot,
    pub stop_grace: Duration,
}

/// Effective settings after CLI, environment and config file are merged
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--device`
    pub device: Option<String>,
    /// `SIMPILOT_DEVICE`
    pub env_device: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl Context<SystemRunner> {
    pub fn from_config(config: &CliConfig, overrides: Overrides) -> Self {
        let timeout_secs = overrides.timeout_secs.unwrap_or(config.defaults.timeout_secs);
        let timeout = Duration::from_secs(timeout_secs);
        let state_file = config
            .recording
            .state_file
            .clone()
            .unwrap_or_else(RecordingSlot::default_state_file);

        Self {
            runner: SystemRunner,
            tools: Tools::new(&config.tools, timeout),
            devices: DeviceResolver::new(
                overrides.device,
                overrides.env_device.or_else(|| config.defaults.device.clone()),
            ),
            output_dir: overrides
                .output_dir
                .unwrap_or_else(|| config.defaults.output_dir.clone()),
            view_quality: config.defaults.view_quality,
            recording: RecordingSlot::new(state_file),
            stop_grace: STOP_GRACE,
        }
    }
}

impl<R: ProcessRunner> Context<R> {
    /// The simulator this invocation targets
    pub async fn device(&self) -> Result<Udid, SimError> {
        self.devices.resolve(&self.runner, &self.tools).await
    }

    /// Run a device-control call, wrapping failures with `context`
    pub async fn run(
        &self,
        invocation: &Invocation,
        context: &str,
    ) -> Result<ProcessOutput, SimError> {
        self.runner
            .run(invocation)
            .await
            .map_err(|e| SimError::process(context, e))
    }

    /// Run a UI bridge call. The bridge reports some failures on stderr
    /// with a zero exit, so any stderr output counts as failure.
    pub async fn run_bridge(
        &self,
        invocation: &Invocation,
        context: &str,
    ) -> Result<ProcessOutput, SimError> {
        let output = self.run(invocation, context).await?;
        if !output.stderr.is_empty() {
            return Err(SimError::process(
                context,
                ExecError::Failed(ProcessFailure {
                    program: invocation.program().to_string(),
                    code: Some(0),
                    signal: None,
                    stdout: output.stdout,
                    stderr: output.stderr,
                }),
            ));
        }
        Ok(output)
    }

    /// `<output_dir>/<prefix>-<timestamp>.<extension>`
    pub fn default_output_path(&self, prefix: &str, extension: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}-{}.{}",
            prefix,
            Local::now().format("%Y%m%d-%H%M%S"),
            extension
        ))
    }
}
