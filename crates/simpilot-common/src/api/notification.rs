use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A push notification payload as delivered by `simctl push`.
///
/// Anything outside `aps` is custom data and is passed through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub aps: Aps,
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

/// The Apple-reserved part of the payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<i64>,
    /// A sound name, or a dictionary for critical alerts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "thread-id", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    pub content_available: Option<u8>,
    /// Keys this model does not name (`mutable-content`, `interruption-level`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Alert text: either a bare string or structured fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Alert {
    Text(String),
    Fields(AlertFields),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlertFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlertFields {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subtitle.is_none()
            && self.body.is_none()
            && self.extra.is_empty()
    }
}

impl NotificationPayload {
    /// Build an alert from discrete title/subtitle/body options.
    /// Returns no alert at all when every field is absent.
    pub fn alert(title: Option<String>, subtitle: Option<String>, body: Option<String>) -> Self {
        let fields = AlertFields {
            title,
            subtitle,
            body,
            extra: Map::new(),
        };
        Self {
            aps: Aps {
                alert: (!fields.is_empty()).then_some(Alert::Fields(fields)),
                ..Default::default()
            },
            custom: Map::new(),
        }
    }

    /// Badge-only payload (count 0 clears the badge)
    pub fn badge(count: i64) -> Self {
        Self {
            aps: Aps {
                badge: Some(count),
                ..Default::default()
            },
            custom: Map::new(),
        }
    }

    /// Background payload: content-available set, no alert
    pub fn silent(custom: Map<String, Value>) -> Self {
        Self {
            aps: Aps {
                content_available: Some(1),
                ..Default::default()
            },
            custom,
        }
    }

    /// Parse a hand-written payload. The document must be an object with an
    /// `aps` object.
    pub fn from_json(raw: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| PayloadError(e.to_string()))?;
        let obj = value
            .as_object()
            .ok_or_else(|| PayloadError("payload must be a JSON object".to_string()))?;
        match obj.get("aps") {
            Some(Value::Object(_)) => {}
            Some(_) => return Err(PayloadError("\"aps\" must be an object".to_string())),
            None => return Err(PayloadError("payload is missing the \"aps\" object".to_string())),
        }
        serde_json::from_value(value).map_err(|e| PayloadError(e.to_string()))
    }

    /// Add one custom top-level field. `aps` is reserved.
    pub fn insert_custom(&mut self, key: &str, value: Value) -> Result<(), PayloadError> {
        if key == "aps" {
            return Err(PayloadError("\"aps\" is reserved and cannot be custom data".to_string()));
        }
        if key.is_empty() {
            return Err(PayloadError("custom data key cannot be empty".to_string()));
        }
        self.custom.insert(key.to_string(), value);
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parse `key=value` custom data. The value is JSON when it parses as JSON,
/// otherwise a plain string.
pub fn parse_custom_field(raw: &str) -> Result<(String, Value), PayloadError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| PayloadError(format!("custom data '{}' must look like key=value", raw)))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid notification payload: {0}")]
pub struct PayloadError(pub String);
