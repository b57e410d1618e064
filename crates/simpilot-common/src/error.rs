use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::api::PayloadError;
use crate::validate::ValidationErrors;

/// Error categories surfaced to the user, each with a fixed exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Success,
    GeneralError,
    InvalidArguments,
    SimulatorNotFound,
    Timeout,
    PermissionDenied,
    FileNotFound,
    CommandNotFound,
}

impl ErrorKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::GeneralError => 1,
            Self::InvalidArguments => 2,
            Self::SimulatorNotFound => 3,
            Self::Timeout => 4,
            Self::PermissionDenied => 5,
            Self::FileNotFound => 6,
            Self::CommandNotFound => 127,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::GeneralError => "GENERAL_ERROR",
            Self::InvalidArguments => "INVALID_ARGUMENTS",
            Self::SimulatorNotFound => "SIMULATOR_NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
        }
    }

    /// Remediation hints attached when an error is classified into this kind
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::SimulatorNotFound => &[
                "Open the Simulator app: open -a Simulator",
                "Boot a device: simpilot device open --name \"iPhone 15\"",
                "Pass a device explicitly: --device <UDID>",
            ],
            Self::Timeout => &[
                "Increase the timeout with --timeout <seconds>",
                "Check that the simulator is responsive",
            ],
            Self::PermissionDenied => &[
                "Check permissions on the files and directories involved",
                "Grant your terminal Accessibility and Screen Recording access in System Settings",
            ],
            Self::FileNotFound => &["Check that the path exists and is spelled correctly"],
            Self::CommandNotFound => &[
                "Install the Xcode command line tools: xcode-select --install",
                "Install idb: brew install facebook/fb/idb-companion && pip3 install fb-idb",
            ],
            Self::Success | Self::GeneralError | Self::InvalidArguments => &[],
        }
    }
}

/// Everything known about a process that ran but did not succeed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessFailure {
    pub program: String,
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessFailure {
    /// The tool's own message: stderr, then stdout, then the exit status
    pub fn message(&self) -> String {
        if !self.stderr.is_empty() {
            self.stderr.clone()
        } else if !self.stdout.is_empty() {
            self.stdout.clone()
        } else if let Some(signal) = self.signal {
            format!("{} terminated by signal {}", self.program, signal)
        } else {
            format!("{} exited with code {:?}", self.program, self.code)
        }
    }
}

/// Failures at the process boundary
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{}", .0.message())]
    Failed(ProcessFailure),
}

/// Errors that can occur in simpilot operations
#[derive(Debug, Error)]
pub enum SimError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    SimulatorNotFound(String),

    #[error("Multiple booted simulators: {}", .0.join(", "))]
    AmbiguousDevice(Vec<String>),

    #[error("{context}: {source}")]
    Process {
        context: String,
        #[source]
        source: ExecError,
    },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid app bundle {}: {reason}", path.display())]
    InvalidBundle { path: PathBuf, reason: String },

    #[error("App not found: {bundle_id}")]
    AppNotFound { bundle_id: String },

    #[error("Refusing to overwrite existing file {}", .0.display())]
    OutputExists(PathBuf),

    #[error("A recording is already active: {} (pid {pid})", path.display())]
    RecordingInProgress { path: PathBuf, pid: u32 },

    #[error("Screenshot failed: {0}")]
    CaptureFailed(String),

    #[error("Recording failed to start: {0}")]
    RecordingFailed(String),

    #[error("Cannot save recording state to {}: {source}", path.display())]
    SessionState {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ValidationErrors> for SimError {
    fn from(err: ValidationErrors) -> Self {
        Self::Validation(err)
    }
}

impl From<crate::validate::ValidationError> for SimError {
    fn from(err: crate::validate::ValidationError) -> Self {
        Self::Validation(err.into())
    }
}

impl SimError {
    /// Wrap a process failure with a short description of what was attempted
    pub fn process(context: impl Into<String>, source: ExecError) -> Self {
        Self::Process {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidBundle { .. }
            | Self::OutputExists(_)
            | Self::Payload(_)
            | Self::AmbiguousDevice(_) => ErrorKind::InvalidArguments,
            Self::SimulatorNotFound(_) => ErrorKind::SimulatorNotFound,
            Self::Process { source, .. } => classify_exec(source),
            Self::FileNotFound(_) | Self::AppNotFound { .. } => ErrorKind::FileNotFound,
            Self::CaptureFailed(message) | Self::RecordingFailed(message) => {
                classify_message(message)
            }
            Self::Io(err) => classify_io(err),
            Self::RecordingInProgress { .. }
            | Self::SessionState { .. }
            | Self::Parse { .. }
            | Self::Config(_) => ErrorKind::GeneralError,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Validation(errors) => errors.iter().map(|e| e.to_string()).collect(),
            Self::InvalidBundle { .. } => {
                vec!["Pass a built .app directory or an .ipa archive".to_string()]
            }
            Self::AppNotFound { .. } => vec![
                "List installed apps with: simpilot app-list".to_string(),
                "Check the bundle identifier spelling".to_string(),
            ],
            Self::AmbiguousDevice(_) => {
                vec!["Pass a device explicitly: --device <UDID>".to_string()]
            }
            Self::OutputExists(_) => vec!["Pass --force to overwrite the file".to_string()],
            Self::RecordingInProgress { .. } => {
                vec!["Stop the active recording first: simpilot record-stop".to_string()]
            }
            Self::SessionState { .. } => vec![
                "Check the recording.state_file setting: simpilot config show".to_string(),
            ],
            Self::Payload(_) => vec![
                "The payload must be a JSON object containing an \"aps\" object".to_string(),
            ],
            other => other
                .kind()
                .suggestions()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        let kind = self.kind();
        ErrorReport {
            error: true,
            message: self.to_string(),
            code: kind.exit_code(),
            kind,
            suggestions: self.suggestions(),
        }
    }
}

/// Serializable error, as printed in structured output mode
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub error: bool,
    pub message: String,
    pub code: i32,
    pub kind: ErrorKind,
    pub suggestions: Vec<String>,
}

/// Classify a process failure from its structured signals, falling back to
/// the message table.
pub fn classify_exec(err: &ExecError) -> ErrorKind {
    match err {
        ExecError::Spawn { source, .. } => match source.kind() {
            io::ErrorKind::NotFound => ErrorKind::CommandNotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::GeneralError,
        },
        ExecError::Timeout { .. } => ErrorKind::Timeout,
        ExecError::Failed(failure) => match failure.code {
            Some(127) => ErrorKind::CommandNotFound,
            Some(126) => ErrorKind::PermissionDenied,
            _ => classify_message(&failure.message()),
        },
    }
}

/// Known phrases in tool output and their kinds. Order matters: the more
/// specific "command not found" is checked before "not found".
const MESSAGE_TABLE: &[(&str, ErrorKind)] = &[
    ("no booted simulator", ErrorKind::SimulatorNotFound),
    ("no devices are booted", ErrorKind::SimulatorNotFound),
    ("timed out", ErrorKind::Timeout),
    ("permission denied", ErrorKind::PermissionDenied),
    ("eacces", ErrorKind::PermissionDenied),
    ("operation not permitted", ErrorKind::PermissionDenied),
    ("command not found", ErrorKind::CommandNotFound),
    ("enoent", ErrorKind::FileNotFound),
    ("no such file", ErrorKind::FileNotFound),
    ("not found", ErrorKind::FileNotFound),
];

pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    MESSAGE_TABLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::GeneralError)
}

fn classify_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::FileNotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        _ => ErrorKind::GeneralError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{self, ValidationError};

    fn failed(code: Option<i32>, stderr: &str) -> ExecError {
        ExecError::Failed(ProcessFailure {
            program: "xcrun".to_string(),
            code,
            stderr: stderr.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorKind::Success.exit_code(), 0);
        assert_eq!(ErrorKind::GeneralError.exit_code(), 1);
        assert_eq!(ErrorKind::InvalidArguments.exit_code(), 2);
        assert_eq!(ErrorKind::SimulatorNotFound.exit_code(), 3);
        assert_eq!(ErrorKind::Timeout.exit_code(), 4);
        assert_eq!(ErrorKind::PermissionDenied.exit_code(), 5);
        assert_eq!(ErrorKind::FileNotFound.exit_code(), 6);
        assert_eq!(ErrorKind::CommandNotFound.exit_code(), 127);
    }

    #[test]
    fn test_message_table() {
        assert_eq!(classify_message("No booted simulator found"), ErrorKind::SimulatorNotFound);
        assert_eq!(classify_message("request timed out"), ErrorKind::Timeout);
        assert_eq!(classify_message("EACCES: open"), ErrorKind::PermissionDenied);
        assert_eq!(classify_message("idb: command not found"), ErrorKind::CommandNotFound);
        assert_eq!(classify_message("ENOENT: missing"), ErrorKind::FileNotFound);
        assert_eq!(classify_message("No such file or directory"), ErrorKind::FileNotFound);
        assert_eq!(classify_message("something odd"), ErrorKind::GeneralError);
    }

    #[test]
    fn test_structured_signals_take_priority() {
        let spawn = ExecError::Spawn {
            program: "idb".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(classify_exec(&spawn), ErrorKind::CommandNotFound);

        let timeout = ExecError::Timeout {
            program: "xcrun".to_string(),
            secs: 30,
        };
        assert_eq!(classify_exec(&timeout), ErrorKind::Timeout);
        assert_eq!(classify_exec(&failed(Some(127), "")), ErrorKind::CommandNotFound);
        assert_eq!(classify_exec(&failed(Some(126), "")), ErrorKind::PermissionDenied);
        assert_eq!(
            classify_exec(&failed(
                Some(1),
                "Unable to find a device matching the provided destination"
            )),
            ErrorKind::GeneralError
        );
    }

    #[test]
    fn test_failure_message_falls_back() {
        let failure = ProcessFailure {
            program: "idb".to_string(),
            code: Some(2),
            ..Default::default()
        };
        assert_eq!(failure.message(), "idb exited with code Some(2)");

        let with_stdout = ProcessFailure {
            stdout: "oops".to_string(),
            ..failure
        };
        assert_eq!(with_stdout.message(), "oops");
    }

    #[test]
    fn test_validation_report_lists_each_field() {
        let err: SimError = validate::ValidationErrors(vec![
            ValidationError::new("x", "must be >= 0"),
            ValidationError::new("duration", "not a number"),
        ])
        .into();

        let report = err.report();
        assert!(report.error);
        assert_eq!(report.code, 2);
        assert_eq!(report.kind, ErrorKind::InvalidArguments);
        assert_eq!(
            report.suggestions,
            vec!["x: must be >= 0".to_string(), "duration: not a number".to_string()]
        );
    }

    #[test]
    fn test_report_json_shape() {
        let err = SimError::SimulatorNotFound("No booted simulator found".to_string());
        let value = serde_json::to_value(err.report()).unwrap();
        assert_eq!(value["error"], serde_json::json!(true));
        assert_eq!(value["code"], serde_json::json!(3));
        assert_eq!(value["kind"], serde_json::json!("SIMULATOR_NOT_FOUND"));
        assert_eq!(value["suggestions"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_process_error_kind_and_hints() {
        let err = SimError::process("simctl install failed", failed(Some(1), "Permission denied"));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(!err.suggestions().is_empty());
        assert_eq!(err.to_string(), "simctl install failed: Permission denied");
    }

    #[test]
    fn test_app_not_found_maps_to_file_not_found() {
        let err = SimError::AppNotFound {
            bundle_id: "com.example.gone".to_string(),
        };
        assert_eq!(err.exit_code(), 6);
        assert!(err.suggestions()[0].contains("app-list"));
    }
}
