//! Build summary

use crate::compiler::BytecodeVersion;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::info;

/// What a library build produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Packages whose modules were all written, alphabetically
    pub built: BTreeSet<String>,
    /// Packages that failed, with the reason
    pub failed: BTreeMap<String, String>,
    /// Packages excluded without an attempt
    pub skipped: BTreeSet<String>,
    /// Number of `.mpy` files written
    pub artifacts_written: usize,
    /// Bytecode version emitted by the compiler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytecode_version: Option<BytecodeVersion>,
    /// Wall-clock time of the build
    #[serde(skip)]
    pub total_time: Duration,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package whose artifacts were placed
    pub fn record_built(&mut self, package: impl Into<String>, artifacts: usize) {
        self.built.insert(package.into());
        self.artifacts_written += artifacts;
    }

    /// Record a failed package
    pub fn record_failed(&mut self, package: impl Into<String>, reason: impl ToString) {
        self.failed.insert(package.into(), reason.to_string());
    }

    /// Record a skipped package
    pub fn record_skipped(&mut self, package: impl Into<String>) {
        self.skipped.insert(package.into());
    }

    /// Successfully built packages in alphabetical order
    pub fn succeeded_packages(&self) -> Vec<&str> {
        self.built.iter().map(String::as_str).collect()
    }

    /// Whether any package failed
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Emit the closing summary through the log
    pub fn log_summary(&self) {
        info!("Build complete.");
        info!("Build successful: {} packages.", self.built.len());
        for package in &self.built {
            info!("> {}", package);
        }
        if self.has_failures() {
            info!("Build failed: {} packages.", self.failed.len());
            for package in self.failed.keys() {
                info!("> {}", package);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_succeeded_packages_sorted_and_unique() {
        let mut report = BuildReport::new();
        report.record_built("zlib", 1);
        report.record_built("aioble", 5);
        report.record_built("copy", 1);
        report.record_built("aioble", 0);

        assert_eq!(report.succeeded_packages(), vec!["aioble", "copy", "zlib"]);
        assert_eq!(report.artifacts_written, 7);
    }

    #[test]
    fn test_failures_tracked() {
        let mut report = BuildReport::new();
        assert!(!report.has_failures());
        report.record_failed("beta", "Compilation failed");
        assert!(report.has_failures());
        assert!(report.built.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let mut report = BuildReport::new();
        report.record_built("copy", 1);
        report.record_skipped("os");
        report.bytecode_version = Some(BytecodeVersion { major: 6, minor: 2 });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["built"], serde_json::json!(["copy"]));
        assert_eq!(json["skipped"], serde_json::json!(["os"]));
        assert_eq!(json["artifacts_written"], 1);
        assert_eq!(json["bytecode_version"]["major"], 6);
        assert!(json.get("total_time").is_none());
    }
}
