//! Output sink: human console lines or structured JSON.

mod progress;
mod styles;

pub use progress::{spinner, spinner_done};
pub use styles::Styles;

use chrono::Utc;
use indicatif::ProgressBar;
use serde_json::{json, Value};
use simpilot_common::SimError;
use std::time::Instant;

use crate::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
    /// JSON plus a `meta` object
    Machine,
}

impl OutputMode {
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Human)
    }
}

/// Facts about the invocation attached in machine mode
#[derive(Debug, Clone)]
pub struct Meta {
    pub command: &'static str,
    pub started: Instant,
}

impl Meta {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            started: Instant::now(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "command": self.command,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
            "elapsed_ms": self.started.elapsed().as_millis() as u64,
        })
    }
}

pub struct Reporter {
    mode: OutputMode,
    quiet: bool,
}

impl Reporter {
    pub fn new(mode: OutputMode, quiet: bool) -> Self {
        Self { mode, quiet }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// A spinner, only in interactive human mode
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        (self.mode == OutputMode::Human && !self.quiet).then(|| spinner(message))
    }

    pub fn render_success(&self, outcome: &Outcome, meta: &Meta) -> String {
        match self.mode {
            OutputMode::Human => {
                let mut lines = Vec::new();
                if !self.quiet {
                    lines.push(if outcome.is_noop() {
                        Styles::info(&outcome.summary)
                    } else {
                        Styles::success(&outcome.summary)
                    });
                }
                lines.extend(outcome.warnings.iter().map(|w| Styles::warning(w)));
                if let Some(ref body) = outcome.body {
                    lines.push(body.clone());
                }
                lines.join("\n")
            }
            OutputMode::Json => pretty(&outcome.to_json()),
            OutputMode::Machine => {
                let mut value = outcome.to_json();
                if let Value::Object(ref mut obj) = value {
                    obj.insert("meta".to_string(), meta.to_json());
                }
                pretty(&value)
            }
        }
    }

    pub fn render_failure(&self, err: &SimError) -> String {
        if self.mode.is_structured() {
            return pretty(&serde_json::to_value(err.report()).unwrap_or_default());
        }

        let mut lines = vec![Styles::error(&err.to_string())];
        let suggestions = err.suggestions();
        if !suggestions.is_empty() {
            lines.push(String::new());
            lines.push(Styles::dimmed("Try:"));
            lines.extend(suggestions.iter().map(|s| Styles::bullet(s)));
        }
        lines.push(String::new());
        lines.push(Styles::dimmed("Run 'simpilot --help' for usage"));
        lines.join("\n")
    }

    /// Print the result on stdout
    pub fn success(&self, outcome: &Outcome, meta: &Meta) {
        let rendered = self.render_success(outcome, meta);
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
    }

    /// Structured failures go to stdout so they can be parsed, human ones to stderr
    pub fn failure(&self, err: &SimError) {
        let rendered = self.render_failure(err);
        if self.mode.is_structured() {
            println!("{}", rendered);
        } else {
            eprintln!("{}", rendered);
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simpilot_common::validate::ValidationError;

    fn outcome() -> Outcome {
        Outcome::done("Tapped at (1, 2)").with("x", 1.0)
    }

    #[test]
    fn test_json_success() {
        let reporter = Reporter::new(OutputMode::Json, false);
        let rendered = reporter.render_success(&outcome(), &Meta::new("tap"));
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["x"], json!(1.0));
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn test_machine_success_has_meta() {
        let reporter = Reporter::new(OutputMode::Machine, false);
        let rendered = reporter.render_success(&outcome(), &Meta::new("tap"));
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["meta"]["command"], json!("tap"));
        assert_eq!(value["meta"]["version"], json!(env!("CARGO_PKG_VERSION")));
        assert!(value["meta"]["elapsed_ms"].is_u64());
    }

    #[test]
    fn test_structured_failure() {
        let reporter = Reporter::new(OutputMode::Machine, false);
        let err = SimError::from(ValidationError::new("x", "-1 must be >= 0"));
        let value: Value = serde_json::from_str(&reporter.render_failure(&err)).unwrap();
        assert_eq!(value["error"], json!(true));
        assert_eq!(value["code"], json!(2));
        assert_eq!(value["suggestions"], json!(["x: -1 must be >= 0"]));
    }

    #[test]
    fn test_human_failure_lists_suggestions() {
        colored::control::set_override(false);
        let reporter = Reporter::new(OutputMode::Human, false);
        let err = SimError::SimulatorNotFound("No booted simulator found".to_string());
        let text = reporter.render_failure(&err);
        assert!(text.starts_with("[error] No booted simulator found"));
        assert!(text.contains("--device <UDID>"));
        assert!(text.ends_with("Run 'simpilot --help' for usage"));
    }

    #[test]
    fn test_noop_and_quiet_rendering() {
        colored::control::set_override(false);
        let reporter = Reporter::new(OutputMode::Human, false);
        let noop = Outcome::noop("No active recording");
        assert_eq!(
            reporter.render_success(&noop, &Meta::new("record-stop")),
            "-> No active recording"
        );

        let unconfirmed =
            Outcome::done("Recording to demo.mp4").with_warning("Recorder did not confirm");
        assert_eq!(
            reporter.render_success(&unconfirmed, &Meta::new("record")),
            "[ok] Recording to demo.mp4\n[warn] Recorder did not confirm"
        );

        let quiet = Reporter::new(OutputMode::Human, true);
        let listing = Outcome::done("2 apps installed").with_body("a\nb");
        assert_eq!(quiet.render_success(&listing, &Meta::new("app-list")), "a\nb");
        assert!(quiet.spinner("waiting").is_none());
    }
}
