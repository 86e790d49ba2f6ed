use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::MirrorError;

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub url: String,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of a whole run: how many resources made it into the mirror and
/// which URLs did not.
#[derive(Debug, Default, Serialize)]
pub struct MirrorReport {
    processed: usize,
    failures: Vec<Failure>,
}

impl MirrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&mut self) -> usize {
        self.processed += 1;
        self.processed
    }

    pub fn record_failure(&mut self, url: &str, error: &MirrorError) {
        self.failures.push(Failure {
            url: url.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Human-readable summary listing at most `max_shown` failures.
    pub fn render_summary(&self, output_dir: &Path, max_shown: usize) -> String {
        let mut summary = format!(
            "Done. Downloaded {} files into {}.\n",
            self.processed,
            output_dir.display()
        );

        if !self.failures.is_empty() {
            summary.push_str("Failures:\n");
            for failure in self.failures.iter().take(max_shown) {
                let _ = writeln!(summary, "- {}: {}", failure.url, failure.message);
            }
            if self.failures.len() > max_shown {
                let _ = writeln!(summary, "... and {} more.", self.failures.len() - max_shown);
            }
        }

        summary
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))
    }
}
