use simpilot_common::{ToolsConfig, Udid};
use std::time::Duration;

use super::{Invocation, InvocationBuilder, DEFAULT_TIMEOUT};

/// Argument grammar of the two external tools.
#[derive(Debug, Clone)]
pub struct Tools {
    xcrun: String,
    idb: String,
    sips: String,
    open: String,
    timeout: Duration,
}

impl Default for Tools {
    fn default() -> Self {
        Self::new(&ToolsConfig::default(), DEFAULT_TIMEOUT)
    }
}

impl Tools {
    pub fn new(config: &ToolsConfig, timeout: Duration) -> Self {
        Self {
            xcrun: config.xcrun.clone(),
            idb: config.idb.clone(),
            sips: config.sips.clone(),
            open: config.open.clone(),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `xcrun simctl <subcommand...>`
    pub fn simctl<I, S>(&self, subcommand: I) -> InvocationBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::builder(&self.xcrun)
            .arg("simctl")
            .args(subcommand)
            .timeout(self.timeout)
    }

    /// `simctl io <udid> <operation>`
    pub fn simctl_io(&self, udid: &Udid, operation: &str) -> InvocationBuilder {
        self.simctl(["io", udid.as_str(), operation])
    }

    /// `idb ui <operation> --udid <udid> --json`
    pub fn bridge(&self, operation: &str, udid: &Udid) -> InvocationBuilder {
        Invocation::builder(&self.idb)
            .args(["ui", operation, "--udid", udid.as_str(), "--json"])
            .timeout(self.timeout)
    }

    pub fn sips(&self) -> InvocationBuilder {
        Invocation::builder(&self.sips).timeout(self.timeout)
    }

    pub fn open(&self) -> InvocationBuilder {
        Invocation::builder(&self.open).timeout(self.timeout)
    }
}
