use serde::{Deserialize, Serialize};

use crate::plist::{self, PlistValue};

/// An app installed on a simulator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppInfo {
    pub bundle_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// How an app listing was extracted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingStrategy {
    /// Parsed as a property-list document keyed by bundle identifier
    Structured,
    /// Best effort: identifiers paired with the nearest display name line
    Positional,
}

/// Extract installed apps from `simctl listapps` output.
pub fn parse_app_listing(output: &str) -> (Vec<AppInfo>, ListingStrategy) {
    match plist::parse(output) {
        Ok(doc @ PlistValue::Dict(_)) => (apps_from_document(&doc), ListingStrategy::Structured),
        _ => (apps_by_position(output), ListingStrategy::Positional),
    }
}

fn apps_from_document(doc: &PlistValue) -> Vec<AppInfo> {
    doc.entries()
        .iter()
        .map(|(key, entry)| {
            let field = |name: &str| entry.get(name).and_then(|v| v.as_str()).map(str::to_string);
            AppInfo {
                bundle_id: field("CFBundleIdentifier").unwrap_or_else(|| key.clone()),
                name: field("CFBundleDisplayName").or_else(|| field("CFBundleName")),
                app_type: field("ApplicationType"),
                path: field("Path"),
            }
        })
        .collect()
}

/// Fallback for output that does not parse. Fragile if simctl ever reorders
/// fields, which is why the structured path is tried first.
fn apps_by_position(output: &str) -> Vec<AppInfo> {
    let mut ids = Vec::new();
    let mut names = Vec::new();

    for (line_no, line) in output.lines().enumerate() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_end_matches(';').trim().trim_matches('"').to_string();
        match key.trim() {
            "CFBundleIdentifier" => ids.push((line_no, value)),
            "CFBundleDisplayName" => names.push((line_no, value)),
            _ => {}
        }
    }

    ids.into_iter()
        .map(|(line_no, bundle_id)| {
            let name = names
                .iter()
                .min_by_key(|(n, _)| n.abs_diff(line_no))
                .map(|(_, name)| name.clone());
            AppInfo {
                bundle_id,
                name,
                app_type: None,
                path: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTAPPS: &str = r#"{
    "com.apple.Preferences" =     {
        ApplicationType = System;
        CFBundleDisplayName = Settings;
        CFBundleIdentifier = "com.apple.Preferences";
        CFBundleName = Settings;
        Path = "/Library/Developer/CoreSimulator/Preferences.app";
    };
    "com.example.Demo" =     {
        ApplicationType = User;
        CFBundleIdentifier = "com.example.Demo";
        CFBundleName = Demo;
    };
}"#;

    #[test]
    fn test_structured_listing() {
        let (apps, strategy) = parse_app_listing(LISTAPPS);
        assert_eq!(strategy, ListingStrategy::Structured);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].bundle_id, "com.apple.Preferences");
        assert_eq!(apps[0].name.as_deref(), Some("Settings"));
        assert_eq!(apps[0].app_type.as_deref(), Some("System"));
        // Falls back to CFBundleName when no display name exists
        assert_eq!(apps[1].name.as_deref(), Some("Demo"));
    }

    #[test]
    fn test_positional_fallback_on_garbled_output() {
        let garbled = "junk {{\n  CFBundleDisplayName = Maps;\n  CFBundleIdentifier = \"com.apple.Maps\";\n  CFBundleIdentifier = \"com.example.x\";\n";
        let (apps, strategy) = parse_app_listing(garbled);
        assert_eq!(strategy, ListingStrategy::Positional);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].bundle_id, "com.apple.Maps");
        assert_eq!(apps[0].name.as_deref(), Some("Maps"));
    }

    #[test]
    fn test_empty_document() {
        let (apps, strategy) = parse_app_listing("{\n}");
        assert!(apps.is_empty());
        assert_eq!(strategy, ListingStrategy::Structured);
    }
}
