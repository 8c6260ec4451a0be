// progress.rs - Scan events and the observers that consume them
// Purpose: The pipeline reports everything it does as a ProgressEvent to an
//          injected Observer: console lines, a JSONL event log, or a recorder

use crate::output::{OutputWriter, PROGRESS_FILE};
use crate::targets::Target;
use chrono::{DateTime, Utc};
use colored::*;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    pub scan_id: String,
    pub target: String,
    pub event_type: EventType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventType {
    ScanStarted,
    ToolStarted { tool_name: String },
    ToolCompleted { tool_name: String, count: usize },
    ToolSkipped { tool_name: String, reason: String },
    ToolFailed { tool_name: String, error: String },
    DataFound { data_type: String, count: usize },
    ParseFailed { input: String, reason: String },
    ScanCompleted,
    ScanFailed { error: String },
}

impl ProgressEvent {
    pub fn new(scan_id: &str, target: &Target, event_type: EventType) -> Self {
        let message = describe(&event_type, target);
        Self {
            timestamp: Utc::now(),
            scan_id: scan_id.to_string(),
            target: target.to_string(),
            event_type,
            message,
        }
    }
}

fn describe(event_type: &EventType, target: &Target) -> String {
    match event_type {
        EventType::ScanStarted => format!("Starting recon for {}", target),
        EventType::ToolStarted { tool_name } => format!("Running {}", tool_name),
        EventType::ToolCompleted { tool_name, count } => {
            format!("{} finished ({} lines)", tool_name, count)
        }
        EventType::ToolSkipped { tool_name, reason } => {
            format!("{} skipped: {}", tool_name, reason)
        }
        EventType::ToolFailed { tool_name, error } => format!("{} failed: {}", tool_name, error),
        EventType::DataFound { data_type, count } => format!("Found {} {}", count, data_type),
        EventType::ParseFailed { input, reason } => format!("Skipping '{}': {}", input, reason),
        EventType::ScanCompleted => format!("Recon for {} complete", target),
        EventType::ScanFailed { error } => format!("Recon for {} failed: {}", target, error),
    }
}

/// Receives every event the pipeline emits.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

// ═══════════════════════════════════════════════════════════════════════════
// CONSOLE
// ═══════════════════════════════════════════════════════════════════════════

/// Human-readable lines on stdout. With a progress bar attached, lines are
/// printed above it and each finished target advances it.
#[derive(Default)]
pub struct ConsoleObserver {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.bar = Some(bar);
        self
    }

    /// Also print parse failures, one line per rejected URL.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn print(&self, line: String) {
        match self.bar {
            Some(ref bar) => bar.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }
}

impl Observer for ConsoleObserver {
    fn on_event(&self, event: &ProgressEvent) {
        let prefix = format!("[{}]", event.target).dimmed();
        let line = match &event.event_type {
            EventType::ScanStarted => format!("{} {}", "[*]".cyan().bold(), event.message.cyan().bold()),
            EventType::ToolStarted { .. } => format!("{} {} {}", "[*]".cyan(), prefix, event.message),
            EventType::ToolCompleted { .. } | EventType::DataFound { .. } => {
                format!("{} {} {}", "[+]".green(), prefix, event.message.green())
            }
            EventType::ToolSkipped { .. } => {
                format!("{} {} {}", "[-]".yellow(), prefix, event.message.yellow())
            }
            EventType::ToolFailed { .. } | EventType::ScanFailed { .. } => {
                format!("{} {} {}", "[!]".red().bold(), prefix, event.message.red())
            }
            EventType::ParseFailed { .. } => {
                if !self.verbose {
                    return;
                }
                format!("{} {} {}", "[-]".dimmed(), prefix, event.message.dimmed())
            }
            EventType::ScanCompleted => {
                format!("{} {}", "[✓]".green().bold(), event.message.green().bold())
            }
        };
        self.print(line);

        if let Some(ref bar) = self.bar {
            if matches!(event.event_type, EventType::ScanCompleted | EventType::ScanFailed { .. }) {
                bar.inc(1);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// JSONL EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════

/// Appends events to `{out}/{target}/progress.jsonl`; the file is reset when
/// a target's scan starts.
pub struct EventLog {
    writer: OutputWriter,
}

impl EventLog {
    pub fn new(writer: OutputWriter) -> Self {
        Self { writer }
    }

    fn append(&self, event: &ProgressEvent) -> std::io::Result<()> {
        let target = Target::new(event.target.clone());
        let dir = self.writer.target_dir(&target);
        fs::create_dir_all(&dir)?;

        let path = dir.join(PROGRESS_FILE);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(event.event_type != EventType::ScanStarted)
            .truncate(event.event_type == EventType::ScanStarted)
            .open(path)?;

        let json = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(file, "{}", json)
    }

    /// Read events back from a log written by [`EventLog`].
    pub fn read_events(path: &std::path::Path) -> Vec<ProgressEvent> {
        fs::read_to_string(path)
            .map(|content| {
                content
                    .lines()
                    .filter_map(|line| serde_json::from_str(line).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Observer for EventLog {
    fn on_event(&self, event: &ProgressEvent) {
        // Losing the event log must never stop a scan.
        self.append(event).ok();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// COMPOSITION / TESTING
// ═══════════════════════════════════════════════════════════════════════════

/// Broadcasts to several observers in order.
#[derive(Default, Clone)]
pub struct Fanout(Vec<Arc<dyn Observer>>);

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn Observer>) -> Self {
        self.0.push(observer);
        self
    }
}

impl Observer for Fanout {
    fn on_event(&self, event: &ProgressEvent) {
        for observer in &self.0 {
            observer.on_event(event);
        }
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn event_types(&self) -> Vec<EventType> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
