//! Recording session state.
//!
//! Idle -> Starting -> Active -> Stopping -> Idle. The Active descriptor is
//! written to a small JSON file so a later `record-stop` invocation can find
//! it; a descriptor whose process is gone is treated as Idle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simpilot_common::SimError;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::exec::process_alive;

/// An active screen recording
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingSession {
    pub path: PathBuf,
    pub pid: u32,
    pub udid: String,
    pub started_at: DateTime<Utc>,
    /// Where the recorder's stderr is collected
    #[serde(default)]
    pub stderr_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordingState {
    Idle,
    Starting,
    Active(RecordingSession),
    Stopping(RecordingSession),
}

/// Owner of the single recording session
#[derive(Debug)]
pub struct RecordingSlot {
    state_file: PathBuf,
    state: RecordingState,
}

impl RecordingSlot {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            state: RecordingState::Idle,
        }
    }

    pub fn default_state_file() -> PathBuf {
        std::env::temp_dir().join("simpilot-recording.json")
    }

    #[cfg(test)]
    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    #[cfg(test)]
    pub fn state_file(&self) -> &std::path::Path {
        &self.state_file
    }

    /// Pick up a descriptor left by an earlier invocation
    fn load(&mut self) {
        if self.state != RecordingState::Idle || !self.state_file.exists() {
            return;
        }

        let session = std::fs::read_to_string(&self.state_file)
            .ok()
            .and_then(|content| serde_json::from_str::<RecordingSession>(&content).ok());

        match session {
            Some(session) if process_alive(session.pid) => {
                debug!("Found active recording {} (pid {})", session.path.display(), session.pid);
                self.state = RecordingState::Active(session);
            }
            Some(session) => {
                warn!("Discarding stale recording descriptor (pid {} is gone)", session.pid);
                self.clear_file();
            }
            None => {
                warn!("Discarding unreadable recording descriptor {}", self.state_file.display());
                self.clear_file();
            }
        }
    }

    /// Idle -> Starting. Fails while another session is active.
    pub fn begin(&mut self) -> Result<(), SimError> {
        self.load();
        match &self.state {
            RecordingState::Idle => {
                self.state = RecordingState::Starting;
                Ok(())
            }
            RecordingState::Active(session) | RecordingState::Stopping(session) => {
                Err(SimError::RecordingInProgress {
                    path: session.path.clone(),
                    pid: session.pid,
                })
            }
            RecordingState::Starting => Err(SimError::RecordingFailed(
                "another recording is already starting".to_string(),
            )),
        }
    }

    /// Starting -> Active, persisting the descriptor
    pub fn activate(&mut self, session: RecordingSession) -> Result<(), SimError> {
        let content = serde_json::to_string_pretty(&session).map_err(|e| SimError::Parse {
            what: "recording descriptor",
            detail: e.to_string(),
        })?;
        if let Err(source) = std::fs::write(&self.state_file, content) {
            self.state = RecordingState::Idle;
            return Err(SimError::SessionState {
                path: self.state_file.clone(),
                source,
            });
        }
        self.state = RecordingState::Active(session);
        Ok(())
    }

    /// Starting -> Idle after a failed start
    pub fn abort(&mut self) {
        self.state = RecordingState::Idle;
    }

    /// Active -> Stopping. Returns the session, if one was active.
    pub fn begin_stop(&mut self) -> Option<RecordingSession> {
        self.load();
        match std::mem::replace(&mut self.state, RecordingState::Idle) {
            RecordingState::Active(session) => {
                self.state = RecordingState::Stopping(session.clone());
                Some(session)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Stopping (or anything) -> Idle
    pub fn finish_stop(&mut self) {
        if let RecordingState::Stopping(ref session) = self.state {
            if let Some(ref log) = session.stderr_log {
                let _ = std::fs::remove_file(log);
            }
        }
        self.clear_file();
        self.state = RecordingState::Idle;
    }

    fn clear_file(&self) {
        if let Err(e) = std::fs::remove_file(&self.state_file) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.state_file.display(), e);
            }
        }
    }
}
