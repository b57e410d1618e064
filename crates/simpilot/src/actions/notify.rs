use simpilot_common::{NotificationPayload, SimError};
use std::io::Write;
use tracing::debug;

use crate::context::Context;
use crate::exec::ProcessRunner;
use crate::outcome::Outcome;
use crate::request::{NotifyKind, NotifyRequest, PayloadSource};

fn load_payload(source: PayloadSource) -> Result<NotificationPayload, SimError> {
    match source {
        PayloadSource::Payload(payload) => Ok(payload),
        PayloadSource::File(path) => {
            if !path.exists() {
                return Err(SimError::FileNotFound(path));
            }
            let content = std::fs::read_to_string(&path)?;
            Ok(NotificationPayload::from_json(&content)?)
        }
    }
}

fn summary(kind: NotifyKind, payload: &NotificationPayload, bundle_id: &str) -> String {
    match kind {
        NotifyKind::Silent => format!("Silent notification sent to {}", bundle_id),
        NotifyKind::ClearBadge => format!("Badge cleared for {}", bundle_id),
        NotifyKind::Badge => format!(
            "Badge set to {} for {}",
            payload.aps.badge.unwrap_or_default(),
            bundle_id
        ),
        NotifyKind::Custom | NotifyKind::Simple | NotifyKind::Test => {
            format!("Notification sent to {}", bundle_id)
        }
    }
}

/// Write the payload to a scratch file and push it
pub async fn send<R: ProcessRunner>(
    ctx: &Context<R>,
    request: NotifyRequest,
) -> Result<Outcome, SimError> {
    let payload = load_payload(request.source)?;
    let document = payload.to_json_pretty().map_err(|e| SimError::Parse {
        what: "notification payload",
        detail: e.to_string(),
    })?;
    let udid = ctx.device().await?;

    // Deleted on drop, including when the push fails
    let mut scratch = tempfile::Builder::new()
        .prefix("simpilot-push-")
        .suffix(".json")
        .tempfile()?;
    scratch.write_all(document.as_bytes())?;
    scratch.flush()?;
    debug!("Payload written to {}", scratch.path().display());

    let inv = ctx.tools.simctl(["push"]).operands([
        udid.to_string(),
        request.bundle_id.clone(),
        scratch.path().display().to_string(),
    ]);
    ctx.run(&inv, "simctl push failed").await?;

    let payload_json = serde_json::to_value(&payload).unwrap_or_default();
    Ok(Outcome::done(summary(request.kind, &payload, &request.bundle_id))
        .with("bundle_id", request.bundle_id)
        .with("payload", payload_json))
}
