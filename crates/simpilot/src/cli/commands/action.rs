use simpilot_common::validate::ValidationErrors;
use simpilot_common::{DeviceFilter, SimError};

use crate::cli::{Commands, DeviceCommands, NotifyArgs};
use crate::request::{
    ActionRequest, InspectRequest, NotifyOptions, NotifyRequest, OpenRequest, Point, RecordRequest,
    ScreenshotRequest, SwipeRequest, TapRequest, ViewRequest,
};

/// Validate a parsed command into an executable request
pub fn request(command: Commands) -> Result<ActionRequest, SimError> {
    let request = match command {
        Commands::Device { command } => match command {
            DeviceCommands::Info => Ok(ActionRequest::DeviceInfo),
            DeviceCommands::Open { udid, ios, name } => {
                OpenRequest::parse(udid.as_deref(), ios, name)
            }
            DeviceCommands::List { ios, name, booted } => {
                Ok(ActionRequest::DeviceList(DeviceFilter {
                    ios_version: ios,
                    name,
                    booted_only: booted,
                }))
            }
        },
        Commands::Tap { x, y, duration } => TapRequest::parse(&x, &y, duration.as_deref()),
        Commands::Type { text } => ActionRequest::text(&text),
        Commands::Swipe {
            x1,
            y1,
            x2,
            y2,
            duration,
            delta,
        } => SwipeRequest::parse([&x1, &y1, &x2, &y2], duration.as_deref(), delta),
        Commands::Press { button } => ActionRequest::press(&button),
        Commands::Inspect { output, format } => {
            InspectRequest::parse(output.as_deref(), format.as_deref())
        }
        Commands::InspectPoint { x, y } => Point::parse(&x, &y).map(ActionRequest::InspectPoint),
        Commands::View {
            output,
            format,
            quality,
        } => ViewRequest::parse(output.as_deref(), format.as_deref(), quality),
        Commands::Screenshot {
            output,
            image_type,
            display,
            mask,
        } => ScreenshotRequest::parse(
            output.as_deref(),
            image_type.as_deref(),
            display.as_deref(),
            mask.as_deref(),
        ),
        Commands::Record {
            output,
            codec,
            display,
            mask,
            force,
        } => RecordRequest::parse(
            output.as_deref(),
            codec.as_deref(),
            display.as_deref(),
            mask.as_deref(),
            force,
        ),
        Commands::RecordStop => Ok(ActionRequest::RecordStop),
        Commands::Install { path } => ActionRequest::install(&path),
        Commands::Launch { bundle_id, terminate } => ActionRequest::launch(&bundle_id, terminate),
        Commands::Uninstall { bundle_id } => ActionRequest::uninstall(&bundle_id),
        Commands::AppList => Ok(ActionRequest::AppList),
        Commands::Notify(args) => notify(args),
        Commands::NotifySimple {
            bundle_id,
            title,
            body,
            subtitle,
        } => NotifyRequest::simple(&bundle_id, title, body, subtitle),
        Commands::NotifyTest { bundle_id } => NotifyRequest::test(&bundle_id),
        Commands::NotifySilent { bundle_id, data } => NotifyRequest::silent(&bundle_id, &data),
        Commands::NotifyBadge { bundle_id, count } => NotifyRequest::badge(&bundle_id, count),
        Commands::ClearBadge { bundle_id } => NotifyRequest::clear_badge(&bundle_id),
        Commands::Config { .. } => {
            return Err(SimError::Config("config commands do not target a device".to_string()))
        }
    };
    Ok(request?)
}

fn notify(args: NotifyArgs) -> Result<ActionRequest, ValidationErrors> {
    let NotifyArgs {
        bundle_id,
        title,
        subtitle,
        body,
        badge,
        sound,
        category,
        thread_id,
        data,
        payload,
        file,
    } = args;
    NotifyRequest::custom(
        &bundle_id,
        NotifyOptions {
            title,
            subtitle,
            body,
            badge,
            sound,
            category,
            thread_id,
            data,
            json: payload,
            file,
        },
    )
}
