// pipeline.rs - Per-target recon pipeline
// Purpose: collect -> classify -> write for each target, with every external
//          tool failure contained and reported through the injected Observer

use crate::classify::{
    self, GF_PATTERNS, GF_PROGRAM, extract_parameters, filter_interesting, filter_js, filter_php,
};
use crate::collect::{
    self, CRTSH_ENDPOINT, CRTSH_SOURCE, LIVENESS_PROBERS, ResultSet, SUBDOMAIN_TOOLS, ToolSpec,
    URL_STATUS_PROBER, URL_TOOLS,
};
use crate::error::{ReconError, Result};
use crate::metrics::ScanSummary;
use crate::output::*;
use crate::progress::{EventType, Observer, ProgressEvent};
use crate::runner::{CommandRunner, DEFAULT_TIMEOUT, Invocation};
use crate::targets::Target;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════

/// Which stages run for each target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stages {
    pub subs: bool,
    pub urls: bool,
    pub js: bool,
    pub params: bool,
    pub php: bool,
    pub gf: bool,
    pub interest: bool,
    pub live_urls: bool,
}

impl Stages {
    pub fn all() -> Self {
        Self {
            subs: true,
            urls: true,
            js: true,
            params: true,
            php: true,
            gf: true,
            interest: true,
            live_urls: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Any stage that reads the URL set.
    pub fn needs_urls(&self) -> bool {
        self.js || self.params || self.php || self.gf || self.interest || self.live_urls
    }
}

/// How URL miners are fed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UrlMode {
    /// Each miner gets the root domain as an argument.
    #[default]
    PerDomain,
    /// Each miner reads the collected subdomains (plus the root) on stdin.
    FromSubdomains,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_root: PathBuf,
    pub stages: Stages,
    pub url_mode: UrlMode,
    pub crtsh: bool,
    /// Base URL of the certificate transparency search.
    pub crtsh_endpoint: String,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("results"),
            stages: Stages::all(),
            url_mode: UrlMode::PerDomain,
            crtsh: true,
            crtsh_endpoint: CRTSH_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: 1,
        }
    }
}

/// Outcome of a multi-target run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub completed: Vec<ScanSummary>,
    pub failed: Vec<(Target, String)>,
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════

/// State owned by one target's run.
struct Scan<'t> {
    target: &'t Target,
    summary: ScanSummary,
}

pub struct Pipeline<R: CommandRunner> {
    runner: R,
    observer: Arc<dyn Observer>,
    writer: OutputWriter,
    config: PipelineConfig,
    http: Option<Client>,
}

impl<R: CommandRunner> Pipeline<R> {
    pub fn new(runner: R, observer: Arc<dyn Observer>, config: PipelineConfig) -> Result<Self> {
        let http = if config.crtsh {
            Some(collect::crtsh_client()?)
        } else {
            None
        };

        Ok(Self {
            runner,
            observer,
            writer: OutputWriter::new(config.output_root.clone()),
            config,
            http,
        })
    }

    pub fn writer(&self) -> &OutputWriter {
        &self.writer
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every target, at most `concurrency` at a time. One target failing
    /// never affects the others.
    pub async fn run_all(&self, targets: &[Target]) -> RunReport {
        let concurrency = self.config.concurrency.max(1);
        let mut results = stream::iter(targets)
            .map(|target| async move { (target, self.run_target(target).await) })
            .buffer_unordered(concurrency);

        let mut report = RunReport::default();
        while let Some((target, result)) = results.next().await {
            match result {
                Ok(summary) => report.completed.push(summary),
                Err(e) => report.failed.push((target.clone(), e.to_string())),
            }
        }
        report
    }

    /// Run the configured stages for one target. Only output-directory I/O
    /// errors surface; tool problems are reported and produce no data.
    pub async fn run_target(&self, target: &Target) -> Result<ScanSummary> {
        let mut scan = Scan {
            target,
            summary: ScanSummary::new(target),
        };
        self.emit(&scan, EventType::ScanStarted);

        match self.run_stages(&mut scan).await {
            Ok(()) => {
                scan.summary.finish();
                self.writer.write_json(target, SUMMARY_FILE, &scan.summary)?;
                self.emit(&scan, EventType::ScanCompleted);
                Ok(scan.summary)
            }
            Err(e) => {
                self.emit(&scan, EventType::ScanFailed { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn run_stages(&self, scan: &mut Scan<'_>) -> Result<()> {
        let stages = self.config.stages;
        let needs_subs =
            stages.interest || (stages.urls && self.config.url_mode == UrlMode::FromSubdomains);

        let subs = if stages.subs {
            let subs = self.collect_subdomains(scan).await;
            self.write_set(scan, SUBS_FILE, &subs)?;
            if let Some(live) = self.probe_live(scan, &subs).await {
                self.write_set(scan, LIVE_SUBS_FILE, &live)?;
            }
            Some(subs)
        } else if needs_subs {
            self.load(scan, SUBS_FILE)
        } else {
            None
        };

        if stages.interest {
            match subs {
                Some(ref subs) => {
                    self.write_set(scan, INTEREST_SUBS_FILE, &filter_interesting(subs))?;
                }
                None => self.skip(scan, INTEREST_SUBS_FILE, "no subdomain list available"),
            }
        }

        let urls = if stages.urls {
            let urls = self.collect_urls(scan, subs.as_ref()).await;
            self.write_set(scan, URLS_FILE, &urls)?;
            Some(urls)
        } else if stages.needs_urls() {
            self.load(scan, URLS_FILE)
        } else {
            None
        };

        let Some(urls) = urls else {
            if stages.needs_urls() {
                self.skip(scan, "url classifiers", "no URL list available");
            }
            return Ok(());
        };

        if stages.js {
            self.write_set(scan, JS_FILE, &filter_js(&urls))?;
        }
        if stages.php {
            self.write_set(scan, PHP_FILE, &filter_php(&urls))?;
        }
        if stages.params {
            self.write_parameters(scan, &urls)?;
        }
        if stages.interest {
            self.write_set(scan, INTEREST_URLS_FILE, &filter_interesting(&urls))?;
        }
        if stages.gf {
            self.run_gf(scan, &urls).await?;
        }
        if stages.live_urls {
            self.probe_urls(scan, &urls).await?;
        }

        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Collection
    // ───────────────────────────────────────────────────────────────────────

    async fn collect_subdomains(&self, scan: &mut Scan<'_>) -> ResultSet {
        let target = scan.target;
        let domain = target.as_str();
        let mut subs = self
            .collect_from(scan, SUBDOMAIN_TOOLS, |tool| tool.for_domain(domain))
            .await;

        if let Some(ref client) = self.http {
            self.emit(scan, EventType::ToolStarted { tool_name: CRTSH_SOURCE.to_string() });
            match collect::query_crtsh(client, &self.config.crtsh_endpoint, domain).await {
                Ok(found) => {
                    self.emit(
                        scan,
                        EventType::ToolCompleted {
                            tool_name: CRTSH_SOURCE.to_string(),
                            count: found.len(),
                        },
                    );
                    scan.summary.tool_ran(CRTSH_SOURCE);
                    subs.merge(found);
                }
                Err(e) => self.fail(scan, CRTSH_SOURCE, &e),
            }
        }

        subs
    }

    async fn collect_urls(&self, scan: &mut Scan<'_>, subs: Option<&ResultSet>) -> ResultSet {
        let target = scan.target;
        let domain = target.as_str();
        match self.config.url_mode {
            UrlMode::PerDomain => {
                self.collect_from(scan, URL_TOOLS, |tool| tool.for_domain(domain))
                    .await
            }
            UrlMode::FromSubdomains => {
                let mut hosts = subs.cloned().unwrap_or_default();
                hosts.insert(domain);
                let input = hosts.to_text();
                self.collect_from(scan, URL_TOOLS, |tool| tool.for_stdin(input.clone()))
                    .await
            }
        }
    }

    /// Union of every available tool's output.
    async fn collect_from<F>(&self, scan: &mut Scan<'_>, tools: &[ToolSpec], invocation_for: F) -> ResultSet
    where
        F: Fn(&ToolSpec) -> Invocation,
    {
        let mut merged = ResultSet::new();
        for tool in tools {
            if let Some(out) = self.capture(scan, tool.name, invocation_for(tool)).await {
                merged.extend_lines(&out);
            }
        }
        merged
    }

    /// Feed the subdomains to the first installed prober. `None` when no
    /// prober is installed.
    async fn probe_live(&self, scan: &mut Scan<'_>, subs: &ResultSet) -> Option<ResultSet> {
        let Some(prober) = LIVENESS_PROBERS
            .iter()
            .find(|p| self.runner.is_available(p.program))
        else {
            self.skip(scan, LIVE_SUBS_FILE, "no liveness prober installed (httpx, httprobe)");
            return None;
        };

        let out = self
            .capture(scan, prober.name, prober.for_stdin(subs.to_text()))
            .await
            .unwrap_or_default();
        Some(ResultSet::from_lines(&out))
    }

    /// Status pass over the URL list: everything that answered goes to
    /// `live-urls.txt`, 403s also to `403-urls.txt`.
    async fn probe_urls(&self, scan: &mut Scan<'_>, urls: &ResultSet) -> Result<()> {
        if !self.runner.is_available(URL_STATUS_PROBER.program) {
            self.skip(scan, URL_STATUS_PROBER.name, "httpx not installed");
            return Ok(());
        }

        let out = self
            .capture(scan, URL_STATUS_PROBER.name, URL_STATUS_PROBER.for_stdin(urls.to_text()))
            .await
            .unwrap_or_default();
        let report = collect::parse_status_lines(&out);

        self.report_rejected(scan, &report.rejected);
        self.write_set(scan, LIVE_URLS_FILE, &report.live)?;
        self.write_set(scan, FORBIDDEN_URLS_FILE, &report.forbidden)?;
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Classification
    // ───────────────────────────────────────────────────────────────────────

    fn write_parameters(&self, scan: &mut Scan<'_>, urls: &ResultSet) -> Result<()> {
        let report = extract_parameters(urls);
        self.report_rejected(scan, &report.rejected);

        let count = self.writer.write_lines(
            scan.target,
            PARAMS_FILE,
            report.entries.iter().map(ToString::to_string),
        )?;
        self.record(scan, PARAMS_FILE, count);
        Ok(())
    }

    async fn run_gf(&self, scan: &mut Scan<'_>, urls: &ResultSet) -> Result<()> {
        if !self.runner.is_available(GF_PROGRAM) {
            self.skip(scan, GF_PROGRAM, "not installed");
            return Ok(());
        }

        for pattern in GF_PATTERNS {
            let tool_name = format!("{} {}", GF_PROGRAM, pattern);
            let out = self
                .capture(scan, &tool_name, classify::gf_invocation(pattern, urls))
                .await
                .unwrap_or_default();
            self.write_set(scan, &classify::gf_artifact(pattern), &ResultSet::from_lines(&out))?;
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Helpers
    // ───────────────────────────────────────────────────────────────────────

    /// Run one tool. Returns `None` when it is missing or fails; both are
    /// reported and neither is an error for the caller.
    async fn capture(&self, scan: &mut Scan<'_>, tool_name: &str, invocation: Invocation) -> Option<String> {
        if !self.runner.is_available(&invocation.program) {
            self.skip(scan, tool_name, "not installed");
            return None;
        }

        let invocation = invocation.timeout(self.config.timeout);
        self.emit(scan, EventType::ToolStarted { tool_name: invocation.to_string() });

        match self.runner.execute(&invocation).await {
            Ok(out) => {
                let count = out.lines().filter(|l| !l.trim().is_empty()).count();
                self.emit(
                    scan,
                    EventType::ToolCompleted {
                        tool_name: tool_name.to_string(),
                        count,
                    },
                );
                scan.summary.tool_ran(tool_name);
                Some(out)
            }
            Err(ReconError::ToolUnavailable(_)) => {
                self.skip(scan, tool_name, "not installed");
                None
            }
            Err(e) => {
                self.fail(scan, tool_name, &e);
                None
            }
        }
    }

    fn report_rejected(&self, scan: &mut Scan<'_>, rejected: &[(String, String)]) {
        for (input, reason) in rejected {
            self.emit(
                scan,
                EventType::ParseFailed {
                    input: input.clone(),
                    reason: reason.clone(),
                },
            );
        }
        scan.summary.parse_failures += rejected.len();
    }

    fn load(&self, scan: &mut Scan<'_>, file_name: &str) -> Option<ResultSet> {
        let set = self.writer.read_set(scan.target, file_name);
        if set.is_none() {
            self.skip(scan, file_name, "no earlier result to reuse");
        }
        set
    }

    fn write_set(&self, scan: &mut Scan<'_>, file_name: &str, set: &ResultSet) -> Result<()> {
        let count = self.writer.write_set(scan.target, file_name, set)?;
        self.record(scan, file_name, count);
        Ok(())
    }

    fn record(&self, scan: &mut Scan<'_>, file_name: &str, count: usize) {
        scan.summary.record_artifact(file_name, count);
        self.emit(
            scan,
            EventType::DataFound {
                data_type: file_name.to_string(),
                count,
            },
        );
    }

    fn skip(&self, scan: &mut Scan<'_>, tool_name: &str, reason: &str) {
        scan.summary.tool_skipped(tool_name);
        self.emit(
            scan,
            EventType::ToolSkipped {
                tool_name: tool_name.to_string(),
                reason: reason.to_string(),
            },
        );
    }

    fn fail(&self, scan: &mut Scan<'_>, tool_name: &str, error: &ReconError) {
        scan.summary.tool_failed(tool_name);
        self.emit(
            scan,
            EventType::ToolFailed {
                tool_name: tool_name.to_string(),
                error: error.to_string(),
            },
        );
    }

    fn emit(&self, scan: &Scan<'_>, event_type: EventType) {
        let event = ProgressEvent::new(&scan.summary.scan_id, scan.target, event_type);
        self.observer.on_event(&event);
    }
}
