use chrono::Utc;
use simpilot_common::SimError;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::ensure_parent;
use crate::context::Context;
use crate::exec::{ProcessRunner, StartSignal};
use crate::outcome::Outcome;
use crate::request::RecordRequest;
use crate::session::RecordingSession;

/// How long to wait for the recorder to confirm it started
pub const RECORD_START_WINDOW: Duration = Duration::from_secs(3);

/// Command line of a running recorder
pub const RECORDING_PATTERN: &str = "simctl io .*recordVideo";

const START_CONFIRMATION: &str = "Recording started";

pub async fn start<R: ProcessRunner>(
    ctx: &mut Context<R>,
    request: RecordRequest,
) -> Result<Outcome, SimError> {
    let path = request
        .output
        .clone()
        .unwrap_or_else(|| ctx.default_output_path("recording", "mp4"));
    if path.exists() && !request.force {
        return Err(SimError::OutputExists(path));
    }

    ctx.recording.begin()?;
    let (session, confirmed) = match launch(ctx, &request, path).await {
        Ok(launched) => launched,
        Err(e) => {
            ctx.recording.abort();
            return Err(e);
        }
    };

    let mut outcome = Outcome::done(format!("Recording to {}", session.path.display()))
        .with("path", session.path.display().to_string())
        .with("pid", session.pid)
        .with("confirmed", confirmed);
    if !confirmed {
        outcome = outcome.with_warning(format!(
            "Recorder did not confirm within {}s; check the file after record-stop",
            RECORD_START_WINDOW.as_secs()
        ));
    }

    let log = session.stderr_log.clone();
    if let Err(e) = ctx.recording.activate(session) {
        // Nothing could find this recorder later, so stop it now
        match ctx.runner.interrupt_matching(RECORDING_PATTERN).await {
            Ok(count) => warn!("Stopped {} recorder(s) after failing to save state", count),
            Err(stop_err) => warn!("Failed to stop recorder: {}", stop_err),
        }
        if let Some(log) = log {
            let _ = std::fs::remove_file(log);
        }
        return Err(e);
    }
    Ok(outcome)
}

/// Spawn the recorder and wait for it to confirm
async fn launch<R: ProcessRunner>(
    ctx: &Context<R>,
    request: &RecordRequest,
    path: std::path::PathBuf,
) -> Result<(RecordingSession, bool), SimError> {
    let udid = ctx.device().await?;
    ensure_parent(&path)?;

    let log = std::env::temp_dir().join(format!("simpilot-record-{}.log", Uuid::new_v4()));
    let inv = ctx
        .tools
        .simctl_io(&udid, "recordVideo")
        .args(request.codec.map(|c| format!("--codec={}", c)))
        .args(request.display.map(|d| format!("--display={}", d)))
        .args(request.mask.map(|m| format!("--mask={}", m)))
        .flag_if("--force", request.force)
        .stderr_to(&log)
        .operands([path.display().to_string()]);

    let mut process = ctx
        .runner
        .spawn_background(&inv)
        .await
        .map_err(|e| SimError::process("simctl recordVideo failed", e))?;

    let confirmed = match process.await_start(START_CONFIRMATION, RECORD_START_WINDOW).await {
        StartSignal::Confirmed => true,
        StartSignal::Pending => false,
        StartSignal::Exited { code, stderr } => {
            let _ = std::fs::remove_file(&log);
            let message = if stderr.is_empty() {
                format!("recorder exited with code {:?}", code)
            } else {
                stderr
            };
            return Err(SimError::RecordingFailed(message));
        }
    };

    let pid = process
        .pid()
        .ok_or_else(|| SimError::RecordingFailed("recorder has no process id".to_string()))?;
    info!("Recording {} (pid {})", path.display(), pid);

    let session = RecordingSession {
        path,
        pid,
        udid: udid.to_string(),
        started_at: Utc::now(),
        stderr_log: Some(log),
    };
    Ok((session, confirmed))
}

pub async fn stop<R: ProcessRunner>(ctx: &mut Context<R>) -> Result<Outcome, SimError> {
    let session = ctx.recording.begin_stop();

    let stopped = match ctx.runner.interrupt_matching(RECORDING_PATTERN).await {
        Ok(count) => count,
        Err(e) => {
            ctx.recording.finish_stop();
            return Err(SimError::process("failed to stop recording", e));
        }
    };

    if stopped == 0 && session.is_none() {
        ctx.recording.finish_stop();
        return Ok(Outcome::noop("No active recording").with("stopped", 0));
    }

    tokio::time::sleep(ctx.stop_grace).await;
    ctx.recording.finish_stop();

    let Some(session) = session else {
        let summary = format!("Stopped {} recording process(es)", stopped);
        return Ok(Outcome::done(summary).with("stopped", stopped));
    };

    let outcome = match std::fs::metadata(&session.path) {
        Ok(meta) => Outcome::done(format!("Recording saved to {}", session.path.display()))
            .with("bytes", meta.len())
            .with("saved", true),
        Err(_) => {
            warn!("Recording file {} is missing", session.path.display());
            Outcome::done("Recording stopped, but no file was written").with("saved", false)
        }
    };
    Ok(outcome
        .with("path", session.path.display().to_string())
        .with("stopped", stopped)
        .with(
            "duration_secs",
            (Utc::now() - session.started_at).num_seconds().max(0),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ActionRequest;
    use crate::session::{RecordingSlot, RecordingState};
    use crate::testing::{argv, context, FakeRunner, BOOTED_UDID, FAKE_PID};
    use serde_json::json;
    use simpilot_common::ErrorKind;

    fn record(output: &str, force: bool) -> RecordRequest {
        let parsed = RecordRequest::parse(Some(output), Some("hevc"), None, Some("black"), force);
        match parsed.unwrap() {
            ActionRequest::Record(request) => request,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_start_builds_background_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("demo.mp4");
        let mut ctx = context(FakeRunner::new(), dir.path());

        let outcome = start(&mut ctx, record(target.to_str().unwrap(), false)).await.unwrap();
        assert_eq!(outcome.data["pid"], json!(FAKE_PID));
        assert_eq!(outcome.data["confirmed"], json!(true));

        let spawned = ctx.runner.background_calls();
        assert_eq!(spawned.len(), 1);
        let target_arg = target.display().to_string();
        assert_eq!(
            argv(&spawned[0]),
            vec![
                "simctl", "io", BOOTED_UDID, "recordVideo", "--codec=hevc", "--mask=black", "--",
                target_arg.as_str()
            ]
        );
        assert!(spawned[0].stderr_log().is_some());
        assert!(matches!(ctx.recording.state(), RecordingState::Active(_)));
    }

    #[tokio::test]
    async fn test_start_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("demo.mp4");
        std::fs::write(&target, b"old").unwrap();
        let mut ctx = context(FakeRunner::new(), dir.path());

        let err = start(&mut ctx, record(target.to_str().unwrap(), false)).await.unwrap_err();
        assert!(matches!(err, SimError::OutputExists(_)));
        assert!(ctx.runner.background_calls().is_empty());

        start(&mut ctx, record(target.to_str().unwrap(), true)).await.unwrap();
        assert!(argv(&ctx.runner.background_calls()[0]).contains(&"--force"));
    }

    #[tokio::test]
    async fn test_second_start_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(FakeRunner::new(), dir.path());
        start(&mut ctx, record(dir.path().join("a.mp4").to_str().unwrap(), false))
            .await
            .unwrap();

        let err = start(&mut ctx, record(dir.path().join("b.mp4").to_str().unwrap(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::RecordingInProgress { pid: FAKE_PID, .. }));
        assert_eq!(ctx.runner.background_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_recorder_dying_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().with_start_signal(StartSignal::Exited {
            code: Some(1),
            stderr: "Operation not permitted".to_string(),
        });
        let mut ctx = context(runner, dir.path());

        let err = start(&mut ctx, record(dir.path().join("a.mp4").to_str().unwrap(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::RecordingFailed(_)));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(ctx.recording.state(), &RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_unconfirmed_start_is_optimistic() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().with_start_signal(StartSignal::Pending);
        let mut ctx = context(runner, dir.path());
        let outcome = start(&mut ctx, record(dir.path().join("a.mp4").to_str().unwrap(), false))
            .await
            .unwrap();
        assert_eq!(outcome.data["confirmed"], json!(false));
        assert!(matches!(ctx.recording.state(), RecordingState::Active(_)));
    }

    #[tokio::test]
    async fn test_unconfirmed_start_carries_warning() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().with_start_signal(StartSignal::Pending);
        let mut ctx = context(runner, dir.path());
        let outcome = start(&mut ctx, record(dir.path().join("a.mp4").to_str().unwrap(), false))
            .await
            .unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("did not confirm"));
    }

    #[tokio::test]
    async fn test_unsaved_session_stops_the_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(FakeRunner::new().with_interrupted(1), dir.path());
        ctx.recording = RecordingSlot::new(dir.path().join("missing").join("rec.json"));

        let err = start(&mut ctx, record(dir.path().join("a.mp4").to_str().unwrap(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::SessionState { .. }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(ctx.runner.background_calls().len(), 1);
        assert_eq!(ctx.runner.interrupt_patterns(), vec![RECORDING_PATTERN.to_string()]);
        assert_eq!(ctx.recording.state(), &RecordingState::Idle);

        let log = ctx.runner.background_calls()[0].stderr_log().map(|p| p.to_path_buf());
        assert!(!log.unwrap().exists());
    }

    #[tokio::test]
    async fn test_stop_without_recording_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(FakeRunner::new().with_interrupted(0), dir.path());

        let outcome = stop(&mut ctx).await.unwrap();
        assert!(outcome.is_noop());
        assert_eq!(outcome.summary, "No active recording");
        assert_eq!(ctx.runner.interrupt_patterns(), vec![RECORDING_PATTERN.to_string()]);
    }

    #[tokio::test]
    async fn test_stop_reports_saved_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("demo.mp4");
        let mut ctx = context(FakeRunner::new().with_interrupted(1), dir.path());
        start(&mut ctx, record(target.to_str().unwrap(), false)).await.unwrap();
        std::fs::write(&target, b"movie").unwrap();

        let outcome = stop(&mut ctx).await.unwrap();
        assert!(!outcome.is_noop());
        assert_eq!(outcome.data["saved"], json!(true));
        assert_eq!(outcome.data["bytes"], json!(5));
        assert_eq!(ctx.recording.state(), &RecordingState::Idle);
        assert!(!ctx.recording.state_file().exists());
    }

    #[tokio::test]
    async fn test_stop_unknown_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(FakeRunner::new().with_interrupted(2), dir.path());
        let outcome = stop(&mut ctx).await.unwrap();
        assert_eq!(outcome.data["stopped"], json!(2));
        assert!(!outcome.is_noop());
    }
}
