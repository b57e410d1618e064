//! Action handlers: validate, resolve a device, build the invocation, run it
//! and turn the result into an [`Outcome`].

mod app;
mod capture;
mod device;
mod inspect;
mod interact;
mod notify;
mod record;

use simpilot_common::SimError;

use crate::context::Context;
use crate::exec::ProcessRunner;
use crate::outcome::Outcome;
use crate::request::ActionRequest;

/// Run one request to completion
pub async fn execute<R: ProcessRunner>(
    ctx: &mut Context<R>,
    request: ActionRequest,
) -> Result<Outcome, SimError> {
    match request {
        ActionRequest::DeviceInfo => device::info(ctx).await,
        ActionRequest::DeviceOpen(open) => device::open(ctx, open).await,
        ActionRequest::DeviceList(filter) => device::list(ctx, &filter).await,
        ActionRequest::Tap(tap) => interact::tap(ctx, tap).await,
        ActionRequest::Type { text } => interact::type_text(ctx, text).await,
        ActionRequest::Swipe(swipe) => interact::swipe(ctx, swipe).await,
        ActionRequest::Press(button) => interact::press(ctx, button).await,
        ActionRequest::Inspect(inspect) => inspect::describe_all(ctx, inspect).await,
        ActionRequest::InspectPoint(point) => inspect::describe_point(ctx, point).await,
        ActionRequest::View(view) => capture::view(ctx, view).await,
        ActionRequest::Screenshot(shot) => capture::screenshot(ctx, shot).await,
        ActionRequest::Record(record) => record::start(ctx, record).await,
        ActionRequest::RecordStop => record::stop(ctx).await,
        ActionRequest::Install { path } => app::install(ctx, path).await,
        ActionRequest::Launch {
            bundle_id,
            terminate,
        } => app::launch(ctx, bundle_id, terminate).await,
        ActionRequest::Uninstall { bundle_id } => app::uninstall(ctx, bundle_id).await,
        ActionRequest::AppList => app::list(ctx).await,
        ActionRequest::Notify(notify) => notify::send(ctx, notify).await,
    }
}

/// Create the parent directory of an output file
fn ensure_parent(path: &std::path::Path) -> Result<(), SimError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}
