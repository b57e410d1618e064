use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tracing::debug;

/// How often a starting process is checked
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of waiting for a background process to confirm it started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSignal {
    /// The confirmation text appeared
    Confirmed,
    /// The process exited before confirming
    Exited { code: Option<i32>, stderr: String },
    /// Still running, no confirmation within the window
    Pending,
}

/// A process left running after spawn
#[async_trait]
pub trait BackgroundProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Poll until `needle` shows up on stderr, the process dies, or `window`
    /// elapses.
    async fn await_start(&mut self, needle: &str, window: Duration) -> StartSignal;
}

/// A spawned OS process whose stderr goes to a log file
pub struct ChildProcess {
    child: Child,
    stderr_log: Option<PathBuf>,
}

impl ChildProcess {
    pub fn new(child: Child, stderr_log: Option<PathBuf>) -> Self {
        Self { child, stderr_log }
    }

    fn stderr_text(&self) -> String {
        self.stderr_log
            .as_ref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BackgroundProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn await_start(&mut self, needle: &str, window: Duration) -> StartSignal {
        let start = Instant::now();

        loop {
            if self.stderr_text().contains(needle) {
                return StartSignal::Confirmed;
            }

            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Background process exited early: {}", status);
                    return StartSignal::Exited {
                        code: status.code(),
                        stderr: self.stderr_text().trim().to_string(),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    return StartSignal::Exited {
                        code: None,
                        stderr: e.to_string(),
                    }
                }
            }

            if start.elapsed() >= window {
                return StartSignal::Pending;
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
