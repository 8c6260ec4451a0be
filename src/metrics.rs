// metrics.rs - Per-target scan summary written as scan_summary.json

use crate::targets::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub target: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,

    /// Artifact file name -> number of lines written.
    pub artifacts: BTreeMap<String, usize>,

    pub tools_run: Vec<String>,
    pub tools_skipped: Vec<String>,
    pub tools_failed: Vec<String>,
    pub parse_failures: usize,
}

impl ScanSummary {
    pub fn new(target: &Target) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            target: target.to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: 0.0,
            artifacts: BTreeMap::new(),
            tools_run: Vec::new(),
            tools_skipped: Vec::new(),
            tools_failed: Vec::new(),
            parse_failures: 0,
        }
    }

    pub fn record_artifact(&mut self, file_name: impl Into<String>, count: usize) {
        self.artifacts.insert(file_name.into(), count);
    }

    pub fn tool_ran(&mut self, tool: &str) {
        self.tools_run.push(tool.to_string());
    }

    pub fn tool_skipped(&mut self, tool: &str) {
        self.tools_skipped.push(tool.to_string());
    }

    pub fn tool_failed(&mut self, tool: &str) {
        self.tools_failed.push(tool.to_string());
    }

    pub fn artifact_count(&self, file_name: &str) -> Option<usize> {
        self.artifacts.get(file_name).copied()
    }

    pub fn finish(&mut self) {
        let end = Utc::now();
        self.duration_seconds = (end - self.start_time).num_milliseconds() as f64 / 1000.0;
        self.end_time = Some(end);
    }
}
