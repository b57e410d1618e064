//! Scripted process runner for unit tests.

use async_trait::async_trait;
use simpilot_common::{ExecError, ProcessFailure};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::context::Context;
use crate::device::DeviceResolver;
use crate::exec::{
    BackgroundProcess, Invocation, ProcessOutput, ProcessRunner, StartSignal, Tools,
};
use crate::session::RecordingSlot;

pub const BOOTED_UDID: &str = "5B8C7A3E-1D2F-4E6A-9B0C-112233445566";

pub const DEVICE_LIST_JSON: &str = r#"{
  "devices": {
    "com.apple.CoreSimulator.SimRuntime.iOS-17-2": [
      {
        "udid": "5B8C7A3E-1D2F-4E6A-9B0C-112233445566",
        "name": "iPhone 15",
        "state": "Booted",
        "isAvailable": true,
        "deviceTypeIdentifier": "com.apple.CoreSimulator.SimDeviceType.iPhone-15"
      },
      {
        "udid": "0F0E0D0C-0B0A-0908-0706-050403020100",
        "name": "iPad Air",
        "state": "Shutdown",
        "isAvailable": false,
        "deviceTypeIdentifier": "com.apple.CoreSimulator.SimDeviceType.iPad-Air"
      }
    ],
    "com.apple.CoreSimulator.SimRuntime.iOS-18-0": [
      {
        "udid": "A1B2C3D4-E5F6-A7B8-C9D0-E1F2A3B4C5D6",
        "name": "iPhone 16 Pro",
        "state": "Shutdown",
        "isAvailable": true,
        "deviceTypeIdentifier": "com.apple.CoreSimulator.SimDeviceType.iPhone-16-Pro"
      }
    ]
  }
}"#;

#[derive(Debug, Clone)]
enum Reply {
    Ok(ProcessOutput),
    Fail(ProcessFailure),
    Timeout,
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
    /// Bytes written to the invocation's last argument (a path)
    writes: Option<Vec<u8>>,
}

/// Records every invocation and answers from scripted rules. The first rule
/// whose needle is contained in the joined argument vector wins; anything
/// unmatched succeeds with empty output.
pub struct FakeRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
    background_calls: Mutex<Vec<Invocation>>,
    interrupt_patterns: Mutex<Vec<String>>,
    interrupted: usize,
    start_signal: StartSignal,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
            background_calls: Mutex::new(Vec::new()),
            interrupt_patterns: Mutex::new(Vec::new()),
            interrupted: 0,
            start_signal: StartSignal::Confirmed,
        }
    }

    fn rule(mut self, needle: &str, reply: Reply, writes: Option<Vec<u8>>) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply,
            writes,
        });
        self
    }

    pub fn on(self, needle: &str, stdout: &str, stderr: &str) -> Self {
        let reply = Reply::Ok(ProcessOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
        self.rule(needle, reply, None)
    }

    pub fn on_writing(self, needle: &str, stderr: &str, bytes: &[u8]) -> Self {
        let reply = Reply::Ok(ProcessOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
        });
        self.rule(needle, reply, Some(bytes.to_vec()))
    }

    pub fn failing(self, needle: &str, code: i32, stderr: &str) -> Self {
        let reply = Reply::Fail(ProcessFailure {
            program: "fake".to_string(),
            code: Some(code),
            stderr: stderr.to_string(),
            ..Default::default()
        });
        self.rule(needle, reply, None)
    }

    pub fn timing_out(self, needle: &str) -> Self {
        self.rule(needle, Reply::Timeout, None)
    }

    pub fn with_device_list(self, json: &str) -> Self {
        self.on("list devices", json, "")
    }

    pub fn with_interrupted(mut self, count: usize) -> Self {
        self.interrupted = count;
        self
    }

    pub fn with_start_signal(mut self, signal: StartSignal) -> Self {
        self.start_signal = signal;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn background_calls(&self) -> Vec<Invocation> {
        self.background_calls.lock().unwrap().clone()
    }

    pub fn interrupt_patterns(&self) -> Vec<String> {
        self.interrupt_patterns.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ExecError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let joined = invocation.args().join(" ");
        let Some(rule) = self.rules.iter().find(|r| joined.contains(&r.needle)) else {
            return Ok(ProcessOutput::default());
        };

        if let (Some(bytes), Some(target)) = (&rule.writes, invocation.args().last()) {
            std::fs::write(PathBuf::from(target), bytes).unwrap();
        }

        match &rule.reply {
            Reply::Ok(output) => Ok(output.clone()),
            Reply::Fail(failure) => Err(ExecError::Failed(failure.clone())),
            Reply::Timeout => Err(ExecError::Timeout {
                program: invocation.program().to_string(),
                secs: invocation.timeout().as_secs(),
            }),
        }
    }

    async fn spawn_background(
        &self,
        invocation: &Invocation,
    ) -> Result<Box<dyn BackgroundProcess>, ExecError> {
        self.background_calls.lock().unwrap().push(invocation.clone());
        Ok(Box::new(FakeBackground {
            signal: self.start_signal.clone(),
        }))
    }

    async fn interrupt_matching(&self, pattern: &str) -> Result<usize, ExecError> {
        self.interrupt_patterns.lock().unwrap().push(pattern.to_string());
        Ok(self.interrupted)
    }
}

pub const FAKE_PID: u32 = 424242;

struct FakeBackground {
    signal: StartSignal,
}

#[async_trait]
impl BackgroundProcess for FakeBackground {
    fn pid(&self) -> Option<u32> {
        Some(FAKE_PID)
    }

    async fn await_start(&mut self, _needle: &str, _window: Duration) -> StartSignal {
        self.signal.clone()
    }
}

/// Context targeting [`BOOTED_UDID`] with scratch state under `dir`
pub fn context(runner: FakeRunner, dir: &std::path::Path) -> Context<FakeRunner> {
    Context {
        runner,
        tools: Tools::default(),
        devices: DeviceResolver::new(Some(BOOTED_UDID.to_string()), None),
        output_dir: dir.to_path_buf(),
        view_quality: 80,
        recording: RecordingSlot::new(dir.join("recording.json")),
        stop_grace: Duration::ZERO,
    }
}

/// The argument vector of a call, as `&str`s
pub fn argv(invocation: &Invocation) -> Vec<&str> {
    invocation.args().iter().map(String::as_str).collect()
}
