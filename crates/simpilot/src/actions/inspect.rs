use serde_json::Value;
use simpilot_common::validate::TreeFormat;
use simpilot_common::SimError;

use super::ensure_parent;
use crate::context::Context;
use crate::exec::ProcessRunner;
use crate::outcome::Outcome;
use crate::request::{InspectRequest, Point};

fn parse_tree(stdout: &str) -> Result<Value, SimError> {
    serde_json::from_str(stdout).map_err(|e| SimError::Parse {
        what: "accessibility tree",
        detail: e.to_string(),
    })
}

/// Pretty-printed tree. Tree and table presentations currently render the
/// same as JSON.
fn render(tree: &Value, format: TreeFormat) -> String {
    match format {
        TreeFormat::Json | TreeFormat::Tree | TreeFormat::Table => {
            serde_json::to_string_pretty(tree).unwrap_or_else(|_| tree.to_string())
        }
    }
}

pub async fn describe_all<R: ProcessRunner>(
    ctx: &Context<R>,
    request: InspectRequest,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let inv = ctx.tools.bridge("describe-all", &udid).build();
    let output = ctx.run_bridge(&inv, "idb describe-all failed").await?;
    let tree = parse_tree(&output.stdout)?;

    let elements = tree.as_array().map_or(1, Vec::len);
    let rendered = render(&tree, request.format);

    match request.output {
        Some(path) => {
            ensure_parent(&path)?;
            std::fs::write(&path, &rendered)?;
            Ok(Outcome::done(format!(
                "Saved {} elements to {}",
                elements,
                path.display()
            ))
            .with("path", path.display().to_string())
            .with("elements", elements))
        }
        None => Ok(Outcome::done(format!("{} elements", elements))
            .with("elements", elements)
            .with("tree", tree)
            .with_body(rendered)),
    }
}

pub async fn describe_point<R: ProcessRunner>(
    ctx: &Context<R>,
    point: Point,
) -> Result<Outcome, SimError> {
    let udid = ctx.device().await?;
    let inv = ctx.tools.bridge("describe-point", &udid).operands(point.args());
    let output = ctx.run_bridge(&inv, "idb describe-point failed").await?;
    let element = parse_tree(&output.stdout)?;

    let label = element
        .get("AXLabel")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| format!("'{}'", s))
        .unwrap_or_else(|| "unlabeled element".to_string());

    let body = render(&element, TreeFormat::Json);
    Ok(Outcome::done(format!("{} at ({}, {})", label, point.x, point.y))
        .with("element", element)
        .with_body(body))
}
