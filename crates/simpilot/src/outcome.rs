use serde::Serialize;
use serde_json::{Map, Value};

/// Whether an action changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Done,
    /// Completed without effect, e.g. stopping when nothing was recording
    NoOp,
}

/// Successful result of one action
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    /// One-line human summary
    pub summary: String,
    /// Action-specific key/value data
    pub data: Map<String, Value>,
    /// Multi-line text printed as-is in human mode (JSON documents, listings)
    pub body: Option<String>,
    /// Things the user should know about even though the action succeeded
    pub warnings: Vec<String>,
}

impl Outcome {
    pub fn done(summary: impl Into<String>) -> Self {
        Self {
            status: Status::Done,
            summary: summary.into(),
            data: Map::new(),
            body: None,
            warnings: Vec::new(),
        }
    }

    pub fn noop(summary: impl Into<String>) -> Self {
        Self {
            status: Status::NoOp,
            ..Self::done(summary)
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn is_noop(&self) -> bool {
        self.status == Status::NoOp
    }

    /// Structured form: `{"success": true, "status", "message", ...data}`
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("success".to_string(), Value::Bool(true));
        obj.insert(
            "status".to_string(),
            serde_json::to_value(self.status).unwrap_or(Value::Null),
        );
        obj.insert("message".to_string(), Value::String(self.summary.clone()));
        for (key, value) in &self.data {
            obj.insert(key.clone(), value.clone());
        }
        if !self.warnings.is_empty() {
            obj.insert("warnings".to_string(), Value::from(self.warnings.clone()));
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_merges_data() {
        let outcome = Outcome::done("Tapped at (100, 200)")
            .with("x", 100.0)
            .with("y", 200.0);
        assert_eq!(
            outcome.to_json(),
            json!({
                "success": true,
                "status": "done",
                "message": "Tapped at (100, 200)",
                "x": 100.0,
                "y": 200.0,
            })
        );
    }

    #[test]
    fn test_warnings_only_when_present() {
        assert!(Outcome::done("ok").to_json().get("warnings").is_none());
        let outcome = Outcome::done("ok").with_warning("not confirmed");
        assert_eq!(outcome.to_json()["warnings"], json!(["not confirmed"]));
    }

    #[test]
    fn test_noop_is_distinct() {
        let outcome = Outcome::noop("No active recording");
        assert!(outcome.is_noop());
        assert_eq!(outcome.to_json()["status"], json!("no_op"));
    }
}
