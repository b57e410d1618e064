//! Input validation.
//!
//! Every user-supplied value passes through one of these functions before it
//! can be placed in a process invocation. Each function is pure and either
//! returns the normalized value or a [`ValidationError`] naming the field.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

use crate::api::Udid;

/// Maximum length of typed text
pub const MAX_TEXT_LEN: usize = 500;
/// Maximum length of a bundle identifier
pub const MAX_BUNDLE_ID_LEN: usize = 256;
/// Maximum length of a path argument
pub const MAX_PATH_LEN: usize = 1024;

static UDID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .expect("UDID regex pattern is valid")
});

static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$").expect("Duration regex pattern is valid")
});

static BUNDLE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.\-]+$").expect("Bundle identifier regex pattern is valid")
});

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// One or more rejected fields from a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "Invalid {}", single),
            many => write!(f, "Invalid arguments ({} fields)", many.len()),
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self(vec![err])
    }
}

/// Collect several field results, reporting every failure at once.
pub fn all<T, const N: usize>(
    results: [Result<T, ValidationError>; N],
) -> Result<[T; N], ValidationErrors> {
    let mut values = Vec::with_capacity(N);
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(v) => values.push(v),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }
    values
        .try_into()
        .map_err(|_| {
            ValidationErrors(vec![ValidationError::new("input", "internal arity mismatch")])
        })
}

/// Simulator identifier: exactly 8-4-4-4-12 hex digits, any case.
pub fn udid(value: &str) -> Result<Udid, ValidationError> {
    if UDID_PATTERN.is_match(value) {
        Ok(Udid::new_unchecked(value.to_string()))
    } else {
        Err(ValidationError::new(
            "device",
            format!(
                "'{}' is not a valid UDID (expected XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX)",
                value
            ),
        ))
    }
}

/// A non-negative screen coordinate
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Coordinate(f64);

impl Coordinate {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn coordinate(field: &str, value: &str) -> Result<Coordinate, ValidationError> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::new(field, format!("'{}' is not a number", value)))?;
    if !parsed.is_finite() {
        return Err(ValidationError::new(field, format!("'{}' is not a finite number", value)));
    }
    if parsed < 0.0 {
        return Err(ValidationError::new(field, format!("{} must be >= 0", value)));
    }
    // Folds "-0" into 0
    Ok(Coordinate(parsed + 0.0))
}

/// Seconds as a non-negative decimal string ("1", "0.5", ".25")
pub fn duration(field: &str, value: &str) -> Result<String, ValidationError> {
    if DURATION_PATTERN.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(ValidationError::new(
            field,
            format!("'{}' is not a non-negative number of seconds", value),
        ))
    }
}

/// Typed text: printable ASCII (0x20-0x7E) only, at most 500 characters.
pub fn text(value: &str) -> Result<String, ValidationError> {
    let length = value.chars().count();
    if length > MAX_TEXT_LEN {
        return Err(ValidationError::new(
            "text",
            format!("text is {} characters, maximum is {}", length, MAX_TEXT_LEN),
        ));
    }
    if let Some((idx, bad)) = value.char_indices().find(|(_, c)| !(' '..='~').contains(c)) {
        return Err(ValidationError::new(
            "text",
            format!(
                "unsupported character {:?} at position {} (only printable ASCII is allowed)",
                bad, idx
            ),
        ));
    }
    Ok(value.to_string())
}

pub fn bundle_id(value: &str) -> Result<String, ValidationError> {
    if value.is_empty() || value.len() > MAX_BUNDLE_ID_LEN {
        return Err(ValidationError::new(
            "bundle_id",
            format!("must be 1-{} characters", MAX_BUNDLE_ID_LEN),
        ));
    }
    if !BUNDLE_ID_PATTERN.is_match(value) {
        return Err(ValidationError::new(
            "bundle_id",
            format!("'{}' may only contain letters, digits, '.' and '-'", value),
        ));
    }
    Ok(value.to_string())
}

/// Path argument. Only the length is checked here.
pub fn path(field: &str, value: &str) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, "path cannot be empty"));
    }
    if value.len() > MAX_PATH_LEN {
        return Err(ValidationError::new(
            field,
            format!("path is longer than {} characters", MAX_PATH_LEN),
        ));
    }
    Ok(value.to_string())
}

/// JPEG quality for view captures
pub fn quality(value: u8) -> Result<u8, ValidationError> {
    if (1..=100).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::new("quality", format!("{} is outside 1-100", value)))
    }
}

/// Swipe step size in points
pub fn delta(value: u32) -> Result<u32, ValidationError> {
    if value == 0 {
        Err(ValidationError::new("delta", "must be at least 1"))
    } else {
        Ok(value)
    }
}

/// App icon badge count
pub fn badge(value: i64) -> Result<i64, ValidationError> {
    if value < 0 {
        Err(ValidationError::new("badge", format!("{} must be >= 0", value)))
    } else {
        Ok(value)
    }
}

/// Hardware buttons the bridge can press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareButton {
    Home,
    Lock,
    VolumeUp,
    VolumeDown,
    Ringer,
    Power,
    /// Simulator screenshot gesture, not a real button
    HomeLock,
}

impl HardwareButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Lock => "lock",
            Self::VolumeUp => "volume-up",
            Self::VolumeDown => "volume-down",
            Self::Ringer => "ringer",
            Self::Power => "power",
            Self::HomeLock => "home+lock",
        }
    }
}

pub fn button(value: &str) -> Result<HardwareButton, ValidationError> {
    let name = value.trim().to_lowercase();
    let button = match name.as_str() {
        "home" => HardwareButton::Home,
        "lock" => HardwareButton::Lock,
        "volume-up" => HardwareButton::VolumeUp,
        "volume-down" => HardwareButton::VolumeDown,
        "ringer" => HardwareButton::Ringer,
        "power" => HardwareButton::Power,
        "home+lock" => HardwareButton::HomeLock,
        combo if combo.contains('+') => {
            return Err(ValidationError::new(
                "button",
                format!("unsupported button combination '{}' (only home+lock is supported)", value),
            ))
        }
        _ => {
            return Err(ValidationError::new(
                "button",
                format!(
                    "unknown button '{}' (expected one of: home, lock, volume-up, volume-down, ringer, power, home+lock)",
                    value
                ),
            ))
        }
    };
    Ok(button)
}

/// Declare a closed option set parsed with [`FromStr`]
macro_rules! option_set {
    ($(#[$meta:meta])* $name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ValidationError::new(
                        $field,
                        format!(
                            "unknown value '{}' (expected one of: {})",
                            value,
                            Self::ALL.join(", ")
                        ),
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_set!(
    /// Screenshot image format
    ImageType, "type", {
        Png => "png",
        Tiff => "tiff",
        Bmp => "bmp",
        Gif => "gif",
        Jpeg => "jpeg",
    }
);

option_set!(
    /// Which display to capture
    DisplayTarget, "display", {
        Internal => "internal",
        External => "external",
    }
);

option_set!(
    /// How to treat non-rectangular display masks
    MaskPolicy, "mask", {
        Ignored => "ignored",
        Alpha => "alpha",
        Black => "black",
    }
);

option_set!(
    /// Video codec for recordings
    Codec, "codec", {
        H264 => "h264",
        Hevc => "hevc",
    }
);

option_set!(
    /// Output format of the view command
    ViewFormat, "format", {
        Png => "png",
        Jpeg => "jpeg",
    }
);

option_set!(
    /// Presentation of an accessibility tree dump
    TreeFormat, "format", {
        Json => "json",
        Tree => "tree",
        Table => "table",
    }
);

impl ImageType {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.as_str(),
        }
    }
}

impl ViewFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}
