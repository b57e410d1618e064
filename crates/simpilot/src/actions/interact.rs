use simpilot_common::validate::{HardwareButton, ImageType};
use simpilot_common::SimError;

use super::capture::{capture, CaptureOptions};
use crate::context::Context;
use crate::exec::ProcessRunner;
use crate::outcome::Outcome;
use crate::request::{SwipeRequest, TapRequest};

pub async fn tap<R: ProcessRunner>(
    ctx: &Context<R>,
    request: TapRequest,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let inv = ctx
        .tools
        .bridge("tap", &udid)
        .flag_value("--duration", request.duration.clone())
        .operands(request.point.args());
    ctx.run_bridge(&inv, "idb tap failed").await?;

    let (x, y) = (request.point.x.value(), request.point.y.value());
    Ok(Outcome::done(format!("Tapped at ({}, {})", request.point.x, request.point.y))
        .with("x", x)
        .with("y", y))
}

pub async fn type_text<R: ProcessRunner>(
    ctx: &Context<R>,
    text: String,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let inv = ctx.tools.bridge("text", &udid).operands([text.as_str()]);
    ctx.run_bridge(&inv, "idb text input failed").await?;

    Ok(Outcome::done(format!("Typed {} characters", text.len())).with("text", text))
}

pub async fn swipe<R: ProcessRunner>(
    ctx: &Context<R>,
    request: SwipeRequest,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let [x1, y1] = request.from.args();
    let [x2, y2] = request.to.args();
    let inv = ctx
        .tools
        .bridge("swipe", &udid)
        .flag_value("--duration", request.duration.clone())
        .flag_value("--delta", request.delta.map(|d| d.to_string()))
        .operands([x1, y1, x2, y2]);
    ctx.run_bridge(&inv, "idb swipe failed").await?;

    Ok(Outcome::done(format!(
        "Swiped from ({}, {}) to ({}, {})",
        request.from.x, request.from.y, request.to.x, request.to.y
    ))
    .with("from", vec![request.from.x.value(), request.from.y.value()])
    .with("to", vec![request.to.x.value(), request.to.y.value()]))
}

/// Bridge name of a single hardware button
fn bridge_button(button: HardwareButton) -> Option<&'static str> {
    match button {
        HardwareButton::Home => Some("HOME"),
        HardwareButton::Lock => Some("LOCK"),
        HardwareButton::Power => Some("SIDE_BUTTON"),
        HardwareButton::VolumeUp => Some("VOLUME_UP"),
        HardwareButton::VolumeDown => Some("VOLUME_DOWN"),
        HardwareButton::Ringer => Some("RINGER"),
        HardwareButton::HomeLock => None,
    }
}

pub async fn press<R: ProcessRunner>(
    ctx: &Context<R>,
    button: HardwareButton,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;

    let Some(name) = bridge_button(button) else {
        // home+lock is the simulator's screenshot gesture
        let path = ctx.default_output_path("screenshot", ImageType::Png.extension());
        capture(ctx, &udid, &path, &CaptureOptions::default()).await?;
        return Ok(Outcome::done(format!("Screenshot saved to {}", path.display()))
            .with("button", button.as_str())
            .with("path", path.display().to_string()));
    };

    let inv = ctx.tools.bridge("button", &udid).operands([name]);
    ctx.run_bridge(&inv, "idb button press failed").await?;
    Ok(Outcome::done(format!("Pressed {}", button.as_str())).with("button", button.as_str()))
}
