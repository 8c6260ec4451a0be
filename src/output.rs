// output.rs - Per-target artifact files under the output root

use crate::collect::ResultSet;
use crate::error::Result;
use crate::targets::Target;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const SUBS_FILE: &str = "subs.txt";
pub const LIVE_SUBS_FILE: &str = "live-subs.txt";
pub const URLS_FILE: &str = "urls.txt";
pub const JS_FILE: &str = "js-file.txt";
pub const PHP_FILE: &str = "php.txt";
pub const PARAMS_FILE: &str = "params.txt";
pub const LIVE_URLS_FILE: &str = "live-urls.txt";
pub const FORBIDDEN_URLS_FILE: &str = "403-urls.txt";
pub const INTEREST_SUBS_FILE: &str = "interest-subs.txt";
pub const INTEREST_URLS_FILE: &str = "interest-urls.txt";
pub const SUMMARY_FILE: &str = "scan_summary.json";
pub const PROGRESS_FILE: &str = "progress.jsonl";

/// Writes artifacts to `{root}/{target}/{file}`.
///
/// Every write truncates: a rerun replaces results instead of growing them.
/// Empty inputs still produce an (empty) file so stale output from an earlier
/// run never survives a stage that ran.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_dir(&self, target: &Target) -> PathBuf {
        self.root.join(target.as_str())
    }

    pub fn artifact_path(&self, target: &Target, file_name: &str) -> PathBuf {
        self.target_dir(target).join(file_name)
    }

    /// Write one line per item. Returns the number of lines written.
    pub fn write_lines<I, S>(&self, target: &Target, file_name: &str, lines: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.artifact_path(target, file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = String::new();
        let mut count = 0;
        for line in lines {
            content.push_str(line.as_ref());
            content.push('\n');
            count += 1;
        }

        fs::write(&path, content)?;
        Ok(count)
    }

    pub fn write_set(&self, target: &Target, file_name: &str, set: &ResultSet) -> Result<usize> {
        self.write_lines(target, file_name, set)
    }

    pub fn write_json<T: Serialize>(&self, target: &Target, file_name: &str, value: &T) -> Result<()> {
        let path = self.artifact_path(target, file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load an artifact written by an earlier run, if it exists.
    pub fn read_set(&self, target: &Target, file_name: &str) -> Option<ResultSet> {
        fs::read_to_string(self.artifact_path(target, file_name))
            .ok()
            .map(|text| ResultSet::from_lines(&text))
    }
}
