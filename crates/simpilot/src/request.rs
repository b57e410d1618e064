//! Validated action requests.
//!
//! Each constructor takes raw dispatcher input and either returns a request
//! carrying only legal values or every field error at once.

use chrono::Utc;
use serde_json::Value;
use simpilot_common::validate::{
    self, Codec, Coordinate, DisplayTarget, HardwareButton, ImageType, MaskPolicy, TreeFormat,
    ValidationError, ValidationErrors, ViewFormat,
};
use simpilot_common::{parse_custom_field, DeviceFilter, NotificationPayload, Udid};
use std::path::PathBuf;

type Validated<T> = Result<T, ValidationErrors>;

/// One user command, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    DeviceInfo,
    DeviceOpen(OpenRequest),
    DeviceList(DeviceFilter),
    Tap(TapRequest),
    Type { text: String },
    Swipe(SwipeRequest),
    Press(HardwareButton),
    Inspect(InspectRequest),
    InspectPoint(Point),
    View(ViewRequest),
    Screenshot(ScreenshotRequest),
    Record(RecordRequest),
    RecordStop,
    Install { path: PathBuf },
    Launch { bundle_id: String, terminate: bool },
    Uninstall { bundle_id: String },
    AppList,
    Notify(NotifyRequest),
}

impl ActionRequest {
    /// Command name reported in machine-readable metadata
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceInfo => "device-info",
            Self::DeviceOpen(_) => "device-open",
            Self::DeviceList(_) => "device-list",
            Self::Tap(_) => "tap",
            Self::Type { .. } => "type",
            Self::Swipe(_) => "swipe",
            Self::Press(_) => "press",
            Self::Inspect(_) => "inspect",
            Self::InspectPoint(_) => "inspect-point",
            Self::View(_) => "view",
            Self::Screenshot(_) => "screenshot",
            Self::Record(_) => "record",
            Self::RecordStop => "record-stop",
            Self::Install { .. } => "install",
            Self::Launch { .. } => "launch",
            Self::Uninstall { .. } => "uninstall",
            Self::AppList => "app-list",
            Self::Notify(request) => request.kind.command(),
        }
    }

    pub fn text(text: &str) -> Validated<Self> {
        Ok(Self::Type {
            text: validate::text(text)?,
        })
    }

    pub fn press(button: &str) -> Validated<Self> {
        Ok(Self::Press(validate::button(button)?))
    }

    pub fn install(path: &str) -> Validated<Self> {
        Ok(Self::Install {
            path: PathBuf::from(validate::path("path", path)?),
        })
    }

    pub fn launch(bundle_id: &str, terminate: bool) -> Validated<Self> {
        Ok(Self::Launch {
            bundle_id: validate::bundle_id(bundle_id)?,
            terminate,
        })
    }

    pub fn uninstall(bundle_id: &str) -> Validated<Self> {
        Ok(Self::Uninstall {
            bundle_id: validate::bundle_id(bundle_id)?,
        })
    }
}

/// Merge two independently validated parts, keeping every error
fn join<A, B>(a: Validated<A>, b: Validated<B>) -> Validated<(A, B)> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(mut first), Err(second)) => {
            first.0.extend(second.0);
            Err(first)
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

/// Validate an optional field
fn optional<T, F>(value: Option<&str>, check: F) -> Validated<Option<T>>
where
    F: FnOnce(&str) -> Result<T, ValidationError>,
{
    value.map(check).transpose().map_err(ValidationErrors::from)
}

fn optional_path(field: &'static str, value: Option<&str>) -> Validated<Option<PathBuf>> {
    optional(value, |v| validate::path(field, v).map(PathBuf::from))
}

fn option<T: std::str::FromStr<Err = ValidationError>>(
    value: Option<&str>,
) -> Validated<Option<T>> {
    optional(value, str::parse::<T>)
}

/// A screen position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: Coordinate,
    pub y: Coordinate,
}

impl Point {
    pub fn parse(x: &str, y: &str) -> Validated<Self> {
        let [x, y] = validate::all([validate::coordinate("x", x), validate::coordinate("y", y)])?;
        Ok(Self { x, y })
    }

    pub fn args(&self) -> [String; 2] {
        [self.x.to_string(), self.y.to_string()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TapRequest {
    pub point: Point,
    pub duration: Option<String>,
}

impl TapRequest {
    pub fn parse(x: &str, y: &str, duration: Option<&str>) -> Validated<ActionRequest> {
        let (point, duration) = join(
            Point::parse(x, y),
            optional(duration, |d| validate::duration("duration", d)),
        )?;
        Ok(ActionRequest::Tap(Self { point, duration }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwipeRequest {
    pub from: Point,
    pub to: Point,
    pub duration: Option<String>,
    pub delta: Option<u32>,
}

impl SwipeRequest {
    pub fn parse(
        coordinates: [&str; 4],
        duration: Option<&str>,
        delta: Option<u32>,
    ) -> Validated<ActionRequest> {
        let [x1, y1, x2, y2] = coordinates;
        let points = validate::all([
            validate::coordinate("x1", x1),
            validate::coordinate("y1", y1),
            validate::coordinate("x2", x2),
            validate::coordinate("y2", y2),
        ]);
        let options = join(
            optional(duration, |d| validate::duration("duration", d)),
            delta.map(validate::delta).transpose().map_err(ValidationErrors::from),
        );
        let ([x1, y1, x2, y2], (duration, delta)) = join(points, options)?;
        Ok(ActionRequest::Swipe(Self {
            from: Point { x: x1, y: y1 },
            to: Point { x: x2, y: y2 },
            duration,
            delta,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub udid: Option<Udid>,
    pub filter: DeviceFilter,
}

impl OpenRequest {
    pub fn parse(
        udid: Option<&str>,
        ios_version: Option<String>,
        name: Option<String>,
    ) -> Validated<ActionRequest> {
        let udid = optional(udid, validate::udid)?;
        Ok(ActionRequest::DeviceOpen(Self {
            udid,
            filter: DeviceFilter {
                ios_version,
                name,
                booted_only: false,
            },
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectRequest {
    pub output: Option<PathBuf>,
    pub format: TreeFormat,
}

impl InspectRequest {
    pub fn parse(output: Option<&str>, format: Option<&str>) -> Validated<ActionRequest> {
        let (output, format) = join(optional_path("output", output), option::<TreeFormat>(format))?;
        Ok(ActionRequest::Inspect(Self {
            output,
            format: format.unwrap_or(TreeFormat::Json),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub output: Option<PathBuf>,
    pub format: ViewFormat,
    pub quality: Option<u8>,
}

impl ViewRequest {
    pub fn parse(
        output: Option<&str>,
        format: Option<&str>,
        quality: Option<u8>,
    ) -> Validated<ActionRequest> {
        let quality = quality
            .map(validate::quality)
            .transpose()
            .map_err(ValidationErrors::from);
        let ((output, format), quality) = join(
            join(optional_path("output", output), option::<ViewFormat>(format)),
            quality,
        )?;
        Ok(ActionRequest::View(Self {
            output,
            format: format.unwrap_or(ViewFormat::Png),
            quality,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotRequest {
    pub output: Option<PathBuf>,
    pub image_type: Option<ImageType>,
    pub display: Option<DisplayTarget>,
    pub mask: Option<MaskPolicy>,
}

impl ScreenshotRequest {
    pub fn parse(
        output: Option<&str>,
        image_type: Option<&str>,
        display: Option<&str>,
        mask: Option<&str>,
    ) -> Validated<ActionRequest> {
        let ((output, image_type), (display, mask)) = join(
            join(optional_path("output", output), option::<ImageType>(image_type)),
            join(option::<DisplayTarget>(display), option::<MaskPolicy>(mask)),
        )?;
        Ok(ActionRequest::Screenshot(Self {
            output,
            image_type,
            display,
            mask,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordRequest {
    pub output: Option<PathBuf>,
    pub codec: Option<Codec>,
    pub display: Option<DisplayTarget>,
    pub mask: Option<MaskPolicy>,
    pub force: bool,
}

impl RecordRequest {
    pub fn parse(
        output: Option<&str>,
        codec: Option<&str>,
        display: Option<&str>,
        mask: Option<&str>,
        force: bool,
    ) -> Validated<ActionRequest> {
        let ((output, codec), (display, mask)) = join(
            join(optional_path("output", output), option::<Codec>(codec)),
            join(option::<DisplayTarget>(display), option::<MaskPolicy>(mask)),
        )?;
        Ok(ActionRequest::Record(Self {
            output,
            codec,
            display,
            mask,
            force,
        }))
    }
}

/// Which notify command built the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Custom,
    Simple,
    Test,
    Silent,
    Badge,
    ClearBadge,
}

impl NotifyKind {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Custom => "notify",
            Self::Simple => "notify-simple",
            Self::Test => "notify-test",
            Self::Silent => "notify-silent",
            Self::Badge => "notify-badge",
            Self::ClearBadge => "clear-badge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSource {
    Payload(NotificationPayload),
    /// Read and checked when the request runs
    File(PathBuf),
}

/// Discrete `notify` options, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub badge: Option<i64>,
    pub sound: Option<String>,
    pub category: Option<String>,
    pub thread_id: Option<String>,
    pub data: Vec<String>,
    pub json: Option<String>,
    pub file: Option<String>,
}

impl NotifyOptions {
    fn has_discrete(&self) -> bool {
        self.title.is_some()
            || self.subtitle.is_some()
            || self.body.is_some()
            || self.badge.is_some()
            || self.sound.is_some()
            || self.category.is_some()
            || self.thread_id.is_some()
            || !self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifyRequest {
    pub bundle_id: String,
    pub source: PayloadSource,
    pub kind: NotifyKind,
}

fn payload_error(message: impl Into<String>) -> ValidationErrors {
    ValidationError::new("payload", message).into()
}

fn insert_custom_data(payload: &mut NotificationPayload, data: &[String]) -> Validated<()> {
    let errors: Vec<ValidationError> = data
        .iter()
        .filter_map(|raw| {
            parse_custom_field(raw)
                .and_then(|(key, value)| payload.insert_custom(&key, value))
                .err()
                .map(|e| ValidationError::new("data", e.0))
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

impl NotifyRequest {
    fn new(
        bundle_id: &str,
        source: Validated<PayloadSource>,
        kind: NotifyKind,
    ) -> Validated<ActionRequest> {
        let bundle_id = validate::bundle_id(bundle_id).map_err(ValidationErrors::from);
        let (bundle_id, source) = join(bundle_id, source)?;
        Ok(ActionRequest::Notify(Self {
            bundle_id,
            source,
            kind,
        }))
    }

    /// Full `notify`: discrete options, a raw JSON document, or a file
    pub fn custom(bundle_id: &str, options: NotifyOptions) -> Validated<ActionRequest> {
        NotifyRequest::new(bundle_id, Self::custom_source(options), NotifyKind::Custom)
    }

    fn custom_source(options: NotifyOptions) -> Validated<PayloadSource> {
        let discrete = options.has_discrete();
        match (options.json, options.file) {
            (Some(_), Some(_)) => Err(payload_error("pass either --json or --file, not both")),
            (Some(_), None) | (None, Some(_)) if discrete => Err(payload_error(
                "discrete options cannot be combined with --json or --file",
            )),
            (Some(raw), None) => NotificationPayload::from_json(&raw)
                .map(PayloadSource::Payload)
                .map_err(|e| payload_error(e.0)),
            (None, Some(file)) => {
                let file = validate::path("file", &file)?;
                Ok(PayloadSource::File(PathBuf::from(file)))
            }
            (None, None) if !discrete => Err(payload_error(
                "nothing to send (give --title/--body, --json or --file)",
            )),
            (None, None) => {
                let badge = options
                    .badge
                    .map(validate::badge)
                    .transpose()
                    .map_err(ValidationErrors::from);
                let mut payload =
                    NotificationPayload::alert(options.title, options.subtitle, options.body);
                let (badge, ()) = join(badge, insert_custom_data(&mut payload, &options.data))?;
                payload.aps.badge = badge;
                payload.aps.sound = options.sound.map(Value::String);
                payload.aps.category = options.category;
                payload.aps.thread_id = options.thread_id;
                Ok(PayloadSource::Payload(payload))
            }
        }
    }

    /// Title and body, with an optional subtitle
    pub fn simple(
        bundle_id: &str,
        title: String,
        body: String,
        subtitle: Option<String>,
    ) -> Validated<ActionRequest> {
        let payload = NotificationPayload::alert(Some(title), subtitle, Some(body));
        NotifyRequest::new(bundle_id, Ok(PayloadSource::Payload(payload)), NotifyKind::Simple)
    }

    /// Recognizable payload for checking that delivery works end to end
    pub fn test(bundle_id: &str) -> Validated<ActionRequest> {
        let sent_at = Utc::now().to_rfc3339();
        let mut payload = NotificationPayload::alert(
            Some("Test Notification".to_string()),
            Some("simpilot".to_string()),
            Some(format!("Delivered at {}", sent_at)),
        );
        payload.aps.badge = Some(1);
        payload.aps.sound = Some(Value::String("default".to_string()));
        payload.custom.insert("simpilot_test".to_string(), Value::Bool(true));
        payload.custom.insert("sent_at".to_string(), Value::String(sent_at));
        NotifyRequest::new(bundle_id, Ok(PayloadSource::Payload(payload)), NotifyKind::Test)
    }

    /// Background payload with optional custom data
    pub fn silent(bundle_id: &str, data: &[String]) -> Validated<ActionRequest> {
        let mut payload = NotificationPayload::silent(Default::default());
        let source =
            insert_custom_data(&mut payload, data).map(|()| PayloadSource::Payload(payload));
        NotifyRequest::new(bundle_id, source, NotifyKind::Silent)
    }

    pub fn badge(bundle_id: &str, count: i64) -> Validated<ActionRequest> {
        let source = validate::badge(count)
            .map(|count| PayloadSource::Payload(NotificationPayload::badge(count)))
            .map_err(ValidationErrors::from);
        NotifyRequest::new(bundle_id, source, NotifyKind::Badge)
    }

    pub fn clear_badge(bundle_id: &str) -> Validated<ActionRequest> {
        let payload = NotificationPayload::badge(0);
        NotifyRequest::new(bundle_id, Ok(PayloadSource::Payload(payload)), NotifyKind::ClearBadge)
    }
}
