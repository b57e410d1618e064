use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::Value;
use simpilot_common::validate::{DisplayTarget, ImageType, MaskPolicy, ViewFormat};
use simpilot_common::{SimError, Udid};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

use super::ensure_parent;
use crate::context::Context;
use crate::exec::ProcessRunner;
use crate::outcome::Outcome;
use crate::request::{ScreenshotRequest, ViewRequest};

/// Printed by simctl on a successful capture
const SCREENSHOT_CONFIRMATION: &str = "Wrote screenshot to";

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct CaptureOptions {
    pub image_type: Option<ImageType>,
    pub display: Option<DisplayTarget>,
    pub mask: Option<MaskPolicy>,
}

/// `simctl io <udid> screenshot` into `path`
pub(super) async fn capture<R: ProcessRunner>(
    ctx: &Context<R>,
    udid: &Udid,
    path: &Path,
    options: &CaptureOptions,
) -> Result<(), SimError> {
    ensure_parent(path)?;
    let before = fingerprint(path);

    let inv = ctx
        .tools
        .simctl_io(udid, "screenshot")
        .args(options.image_type.map(|t| format!("--type={}", t)))
        .args(options.display.map(|d| format!("--display={}", d)))
        .args(options.mask.map(|m| format!("--mask={}", m)))
        .operands([path.display().to_string()]);
    let output = ctx.run(&inv, "simctl screenshot failed").await?;

    let written = match fingerprint(path) {
        Some(after) => before != Some(after),
        None => false,
    };
    if output.stderr.contains(SCREENSHOT_CONFIRMATION) || written {
        Ok(())
    } else if output.stderr.is_empty() {
        Err(SimError::CaptureFailed(format!("no file was written to {}", path.display())))
    } else {
        Err(SimError::CaptureFailed(output.stderr))
    }
}

/// Modification time and size of an existing file
fn fingerprint(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

pub async fn screenshot<R: ProcessRunner>(
    ctx: &Context<R>,
    request: ScreenshotRequest,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let image_type = request.image_type.unwrap_or(ImageType::Png);
    let path = request
        .output
        .unwrap_or_else(|| ctx.default_output_path("screenshot", image_type.extension()));

    let options = CaptureOptions {
        image_type: request.image_type,
        display: request.display,
        mask: request.mask,
    };
    capture(ctx, &udid, &path, &options).await?;

    Ok(Outcome::done(format!("Screenshot saved to {}", path.display()))
        .with("path", path.display().to_string())
        .with("type", image_type.as_str()))
}

/// Width and height of the topmost element in a `describe-all` tree
fn root_frame(tree: &Value) -> Option<(f64, f64)> {
    let root = match tree {
        Value::Array(elements) => elements.first()?,
        other => other,
    };
    let frame = root.get("frame")?;
    let width = frame.get("width")?.as_f64()?;
    let height = frame.get("height")?.as_f64()?;
    (width > 0.0 && height > 0.0).then_some((width, height))
}

/// Screenshot sized to the screen's point dimensions, saved or inlined
pub async fn view<R: ProcessRunner>(
    ctx: &Context<R>,
    request: ViewRequest,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let quality = request.quality.unwrap_or(ctx.view_quality);

    // Removed on drop, whatever happens below
    let scratch = tempfile::Builder::new().prefix("simpilot-view-").tempdir()?;
    let raw = scratch.path().join("capture.png");
    let options = CaptureOptions {
        image_type: Some(ImageType::Png),
        ..Default::default()
    };
    capture(ctx, &udid, &raw, &options).await?;

    let image = match request.format {
        ViewFormat::Png => raw,
        ViewFormat::Jpeg => {
            let converted = scratch.path().join("view.jpg");
            let tree_inv = ctx.tools.bridge("describe-all", &udid).build();
            let output = ctx.run_bridge(&tree_inv, "idb describe-all failed").await?;
            let frame = serde_json::from_str::<Value>(&output.stdout)
                .ok()
                .as_ref()
                .and_then(root_frame);

            let mut sips = ctx
                .tools
                .sips()
                .args(["-s", "format", "jpeg", "-s", "formatOptions"])
                .arg(quality.to_string());
            match frame {
                Some((width, height)) => {
                    debug!("Resizing view to {}x{}", width, height);
                    sips = sips
                        .arg("-z")
                        .arg(format!("{}", height.round()))
                        .arg(format!("{}", width.round()));
                }
                None => warn!("No screen frame in accessibility tree, keeping capture size"),
            }
            let sips = sips
                .arg(raw.display().to_string())
                .arg("--out")
                .arg(converted.display().to_string())
                .build();
            ctx.run(&sips, "sips conversion failed").await?;
            converted
        }
    };

    let bytes = std::fs::read(&image)?;
    let mime_type = request.format.mime_type();

    match request.output {
        Some(path) => {
            ensure_parent(&path)?;
            std::fs::write(&path, &bytes)?;
            Ok(Outcome::done(format!("View saved to {}", path.display()))
                .with("path", path.display().to_string())
                .with("mime_type", mime_type)
                .with("bytes", bytes.len()))
        }
        None => {
            let encoded = B64.encode(&bytes);
            Ok(Outcome::done(format!("Captured view ({} bytes, {})", bytes.len(), mime_type))
                .with("mime_type", mime_type)
                .with("bytes", bytes.len())
                .with("data", encoded.clone())
                .with_body(encoded))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ActionRequest;
    use crate::testing::{argv, context, FakeRunner, BOOTED_UDID};
    use serde_json::json;
    use simpilot_common::ErrorKind;

    const TREE: &str = r#"[{"type": "Application", "frame": {"x": 0, "y": 0, "width": 393, "height": 852}}]"#;

    fn shot(args: [Option<&str>; 4]) -> ScreenshotRequest {
        let [output, image_type, display, mask] = args;
        match ScreenshotRequest::parse(output, image_type, display, mask).unwrap() {
            ActionRequest::Screenshot(request) => request,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_screenshot_with_options() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shots/home.jpg");
        let runner =
            FakeRunner::new().on_writing("screenshot", "Wrote screenshot to: home.jpg", b"jpg");
        let ctx = context(runner, dir.path());

        let request = shot([
            Some(target.to_str().unwrap()),
            Some("jpeg"),
            Some("internal"),
            Some("black"),
        ]);
        let outcome = screenshot(&ctx, request).await.unwrap();

        let target_arg = target.display().to_string();
        assert_eq!(
            argv(&ctx.runner.calls()[0]),
            vec![
                "simctl", "io", BOOTED_UDID, "screenshot", "--type=jpeg", "--display=internal",
                "--mask=black", "--", target_arg.as_str()
            ]
        );
        assert_eq!(outcome.data["path"], json!(target_arg));
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_screenshot_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on("screenshot", "", "Wrote screenshot to: somewhere");
        let ctx = context(runner, dir.path());

        let outcome = screenshot(&ctx, shot([None; 4])).await.unwrap();
        let path = outcome.data["path"].as_str().unwrap().to_string();
        assert!(path.starts_with(dir.path().to_str().unwrap()));
        assert!(path.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_screenshot_without_confirmation_or_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(FakeRunner::new(), dir.path());
        let err = screenshot(&ctx, shot([None; 4])).await.unwrap_err();
        assert!(matches!(err, SimError::CaptureFailed(_)));
    }

    #[tokio::test]
    async fn test_stale_file_is_not_a_capture() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("old.png");
        std::fs::write(&target, b"yesterday").unwrap();
        let ctx = context(FakeRunner::new(), dir.path());

        let err = screenshot(&ctx, shot([Some(target.to_str().unwrap()), None, None, None]))
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::CaptureFailed(_)));
    }

    #[tokio::test]
    async fn test_screenshot_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let runner =
            FakeRunner::new().failing("screenshot", 127, "xcrun: error: unable to find utility");
        let ctx = context(runner, dir.path());
        let err = screenshot(&ctx, shot([None; 4])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandNotFound);
    }

    #[test]
    fn test_root_frame() {
        let tree: Value = serde_json::from_str(TREE).unwrap();
        assert_eq!(root_frame(&tree), Some((393.0, 852.0)));
        assert_eq!(root_frame(&json!([])), None);
        assert_eq!(root_frame(&json!({"frame": {"width": 0, "height": 10}})), None);
    }

    #[tokio::test]
    async fn test_view_png_inline_skips_tree_query() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new().on_writing("screenshot", "", b"\x89PNG");
        let ctx = context(runner, dir.path());
        let request = ViewRequest {
            output: None,
            format: ViewFormat::Png,
            quality: None,
        };

        let outcome = view(&ctx, request).await.unwrap();
        assert_eq!(outcome.data["mime_type"], json!("image/png"));
        assert_eq!(outcome.data["data"], json!(B64.encode(b"\x89PNG")));
        assert!(ctx.runner.calls().iter().all(|c| c.program() == "xcrun"));

        // Scratch capture is gone
        let raw = ctx.runner.calls()[0].args().last().unwrap().clone();
        assert!(!Path::new(&raw).exists());
    }

    #[tokio::test]
    async fn test_view_jpeg_resizes_with_frame() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("view.jpg");
        let runner = FakeRunner::new()
            .on_writing("screenshot", "", b"png")
            .on("describe-all", TREE, "")
            .on_writing("formatOptions", "", b"jpeg-bytes");
        let ctx = context(runner, dir.path());
        let request = ViewRequest {
            output: Some(out.clone()),
            format: ViewFormat::Jpeg,
            quality: Some(60),
        };

        let outcome = view(&ctx, request).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"jpeg-bytes");
        assert_eq!(outcome.data["mime_type"], json!("image/jpeg"));

        let calls = ctx.runner.calls();
        let sips = calls.iter().find(|c| c.program() == "sips").unwrap();
        let args = argv(sips);
        assert_eq!(&args[..8], &["-s", "format", "jpeg", "-s", "formatOptions", "60", "-z", "852"]);
        assert_eq!(args[8], "393");
    }
}
