//! Process boundary.
//!
//! Every external tool call goes through a [`ProcessRunner`]. Arguments are
//! always passed as a vector; nothing is ever interpreted by a shell.

mod background;
mod tools;

pub use background::{BackgroundProcess, ChildProcess, StartSignal};
pub use tools::Tools;

use async_trait::async_trait;
use simpilot_common::{ExecError, ProcessFailure};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Timeout for blocking calls unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Separator placed before user-supplied operands
pub const END_OF_OPTIONS: &str = "--";

/// A fully built process invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    stderr_log: Option<PathBuf>,
}

impl Invocation {
    pub fn builder(program: impl Into<String>) -> InvocationBuilder {
        InvocationBuilder {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            stderr_log: None,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    #[cfg(test)]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[cfg(test)]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// File that receives stderr of a background process
    pub fn stderr_log(&self) -> Option<&Path> {
        self.stderr_log.as_deref()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        cmd
    }
}

/// Builds an [`Invocation`]. Flags come first; user operands are appended by
/// [`InvocationBuilder::operands`], which also finishes the build so nothing
/// can follow them.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    stderr_log: Option<PathBuf>,
}

impl InvocationBuilder {
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` when a value is present
    pub fn flag_value(self, flag: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    /// Append `flag` when `enabled`
    pub fn flag_if(self, flag: &str, enabled: bool) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stderr_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_log = Some(path.into());
        self
    }

    /// Finish without operands
    pub fn build(self) -> Invocation {
        Invocation {
            program: self.program,
            args: self.args,
            timeout: self.timeout,
            stderr_log: self.stderr_log,
        }
    }

    /// Append the end-of-options separator followed by user operands
    pub fn operands<I, S>(self, operands: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg(END_OF_OPTIONS).args(operands).build()
    }
}

/// Captured, whitespace-trimmed output of a successful process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Spawns external processes
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion (or timeout) and collect output
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ExecError>;

    /// Start without waiting for completion
    async fn spawn_background(
        &self,
        invocation: &Invocation,
    ) -> Result<Box<dyn BackgroundProcess>, ExecError>;

    /// Send SIGINT to every process whose command line matches `pattern`.
    /// Returns how many processes were signalled; zero is not an error.
    async fn interrupt_matching(&self, pattern: &str) -> Result<usize, ExecError>;
}

/// Runner backed by real OS processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ExecError> {
        debug!("Running {} {:?}", invocation.program, invocation.args);

        let mut cmd = invocation.command();
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let waited = tokio::time::timeout(invocation.timeout, child.wait_with_output()).await;
        let output = match waited {
            Ok(result) => result.map_err(|source| ExecError::Spawn {
                program: invocation.program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(ExecError::Timeout {
                    program: invocation.program.clone(),
                    secs: invocation.timeout.as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(ExecError::Failed(ProcessFailure {
                program: invocation.program.clone(),
                code: output.status.code(),
                signal: exit_signal(&output.status),
                stdout,
                stderr,
            }));
        }

        Ok(ProcessOutput { stdout, stderr })
    }

    async fn spawn_background(
        &self,
        invocation: &Invocation,
    ) -> Result<Box<dyn BackgroundProcess>, ExecError> {
        debug!("Spawning {} {:?} in background", invocation.program, invocation.args);

        let spawn_err = |source| ExecError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        let stderr = match invocation.stderr_log() {
            Some(path) => Stdio::from(std::fs::File::create(path).map_err(spawn_err)?),
            None => Stdio::null(),
        };

        let mut cmd = invocation.command();
        cmd.stdout(Stdio::null()).stderr(stderr).kill_on_drop(false);

        let child = cmd.spawn().map_err(spawn_err)?;
        Ok(Box::new(ChildProcess::new(
            child,
            invocation.stderr_log().map(Path::to_path_buf),
        )))
    }

    async fn interrupt_matching(&self, pattern: &str) -> Result<usize, ExecError> {
        let lookup = Invocation::builder("pgrep").arg("-f").arg(pattern).build();

        let output = match self.run(&lookup).await {
            Ok(output) => output,
            // pgrep exits 1 when nothing matched
            Err(ExecError::Failed(ProcessFailure { code: Some(1), .. })) => return Ok(0),
            Err(e) => return Err(e),
        };

        let own_pid = std::process::id();
        let mut signalled = 0;
        for pid in output
            .stdout
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .filter(|pid| *pid != own_pid)
        {
            if send_interrupt(pid)? {
                debug!("Sent SIGINT to {}", pid);
                signalled += 1;
            }
        }
        Ok(signalled)
    }
}

/// Send SIGINT. Returns false if the process already exited.
#[cfg(unix)]
fn send_interrupt(pid: u32) -> Result<bool, ExecError> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(ExecError::Spawn {
            program: "kill".to_string(),
            source: err,
        })
    }
}

#[cfg(not(unix))]
fn send_interrupt(_pid: u32) -> Result<bool, ExecError> {
    Err(ExecError::Spawn {
        program: "kill".to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "process signals are not supported on this platform",
        ),
    })
}

/// Whether a process with this pid still exists
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operands_follow_separator() {
        let inv = Invocation::builder("idb")
            .args(["ui", "tap"])
            .flag_value("--duration", Some("0.5"))
            .flag_value("--delta", None::<String>)
            .flag_if("--json", true)
            .flag_if("--force", false)
            .operands(["100", "200"]);

        assert_eq!(inv.program(), "idb");
        assert_eq!(
            inv.args(),
            &["ui", "tap", "--duration", "0.5", "--json", "--", "100", "200"]
        );
        assert_eq!(inv.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_flag_looking_operand_stays_after_separator() {
        let inv = Invocation::builder("idb")
            .args(["ui", "text"])
            .operands(["--help"]);
        let sep = inv.args().iter().position(|a| a == END_OF_OPTIONS).unwrap();
        let value = inv.args().iter().position(|a| a == "--help").unwrap();
        assert!(value > sep);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_trimmed_output() {
        let inv = Invocation::builder("sh")
            .arg("-c")
            .arg("echo '  out  '; echo ' err ' >&2")
            .build();
        let output = SystemRunner.run(&inv).await.unwrap();
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_exit_code_and_stderr() {
        let inv = Invocation::builder("sh")
            .arg("-c")
            .arg("echo 'No such file' >&2; exit 3")
            .build();
        match SystemRunner.run(&inv).await {
            Err(ExecError::Failed(failure)) => {
                assert_eq!(failure.code, Some(3));
                assert_eq!(failure.stderr, "No such file");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let inv = Invocation::builder("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100))
            .build();
        assert!(matches!(
            SystemRunner.run(&inv).await,
            Err(ExecError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let inv = Invocation::builder("simpilot-definitely-missing-binary").build();
        match SystemRunner.run(&inv).await {
            Err(ExecError::Spawn { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_own_process_is_alive() {
        assert!(process_alive(std::process::id()));
    }
}
