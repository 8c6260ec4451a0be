// main.rs - reconrust CLI
// Purpose: Parse arguments, resolve targets and drive the recon pipeline

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use reconrust::output::OutputWriter;
use reconrust::progress::{ConsoleObserver, EventLog, Fanout};
use reconrust::runner::SystemRunner;
use reconrust::targets::load_targets;
use reconrust::{Pipeline, PipelineConfig, RunReport, Stages, TargetSource, UrlMode, tools};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// reconrust - Recon pipeline around subfinder, gau, waybackurls, httpx and gf
#[derive(Parser, Debug)]
#[command(
    name = "reconrust",
    version,
    about = "Collect subdomains and URLs with external recon tools, then filter and classify them",
    after_help = r#"
EXAMPLES:
  reconrust -d example.com                 run every stage
  reconrust -d example.com -s -u --js      subdomains, URLs and JS files only
  reconrust -f domains.txt --all --from-subs --concurrency 4
  reconrust --check-tools

OUTPUT FILES ({out}/{domain}/):
  subs.txt  live-subs.txt  urls.txt  live-urls.txt  403-urls.txt
  js-file.txt  php.txt  params.txt
  gf_{xss,sqli,lfi,rce,redirect}.txt  interest-subs.txt  interest-urls.txt
  scan_summary.json  progress.jsonl
"#
)]
struct Args {
    /// Target domain (e.g. example.com)
    #[arg(short, long, value_name = "DOMAIN", conflicts_with = "file", help_heading = "Target Options")]
    domain: Option<String>,

    /// File with one domain per line (# for comments)
    #[arg(short, long, value_name = "FILE", help_heading = "Target Options")]
    file: Option<PathBuf>,

    /// Enumerate subdomains (and probe which are live)
    #[arg(short, long, help_heading = "Stages")]
    subs: bool,

    /// Collect historical URLs
    #[arg(short, long, help_heading = "Stages")]
    urls: bool,

    /// Extract JavaScript file URLs
    #[arg(short, long, help_heading = "Stages")]
    js: bool,

    /// Extract query parameters from URLs
    #[arg(short, long, help_heading = "Stages")]
    params: bool,

    /// Extract PHP URLs
    #[arg(long, help_heading = "Stages")]
    php: bool,

    /// Run gf patterns (xss, sqli, lfi, rce, redirect) over the URLs
    #[arg(short, long, help_heading = "Stages")]
    gf: bool,

    /// Keep subdomains/URLs matching login, rest, password, update, admin
    #[arg(long, help_heading = "Stages")]
    interest: bool,

    /// Probe collected URLs with httpx and keep live and 403 responses
    #[arg(long, help_heading = "Stages")]
    live_urls: bool,

    /// Run every stage (default when no stage flag is given)
    #[arg(short, long, help_heading = "Stages")]
    all: bool,

    /// Feed collected subdomains to the URL miners instead of the root domain
    #[arg(long, help_heading = "Collection")]
    from_subs: bool,

    /// Do not query crt.sh during subdomain enumeration
    #[arg(long, help_heading = "Collection")]
    no_crtsh: bool,

    /// Per-tool timeout in seconds
    #[arg(long, default_value = "120", value_name = "SECONDS", help_heading = "Collection")]
    timeout: u64,

    /// Targets processed at the same time
    #[arg(long, default_value = "1", value_name = "NUM", help_heading = "Performance")]
    concurrency: usize,

    /// Output root directory
    #[arg(short, long, default_value = "results", value_name = "DIR", help_heading = "Output")]
    out: PathBuf,

    /// Also print every URL the parameter extractor could not parse
    #[arg(short, long, help_heading = "Output")]
    verbose: bool,

    /// Show which external tools are installed
    #[arg(long, help_heading = "Tool Management")]
    check_tools: bool,

    /// Install missing external tools with `go install`
    #[arg(long, help_heading = "Tool Management")]
    install_tools: bool,
}

impl Args {
    fn stages(&self) -> Stages {
        let selected = Stages {
            subs: self.subs,
            urls: self.urls,
            js: self.js,
            params: self.params,
            php: self.php,
            gf: self.gf,
            interest: self.interest,
            live_urls: self.live_urls,
        };

        if self.all || selected.is_empty() {
            Stages::all()
        } else {
            selected
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            output_root: self.out.clone(),
            stages: self.stages(),
            url_mode: if self.from_subs {
                UrlMode::FromSubdomains
            } else {
                UrlMode::PerDomain
            },
            crtsh: !self.no_crtsh,
            timeout: Duration::from_secs(self.timeout.max(1)),
            concurrency: self.concurrency.max(1),
            ..PipelineConfig::default()
        }
    }
}

/// clap cannot express the single-dash `-all`; rewrite it to `--all`.
fn normalize_legacy_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|a| if a == "-all" { "--all".to_string() } else { a })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_from(normalize_legacy_flags(std::env::args()));

    print_banner();

    let runner = SystemRunner::new();

    if args.check_tools {
        let statuses = tools::check_tools(&runner).await;
        tools::print_tool_status(&statuses);
        return Ok(());
    }

    if args.install_tools {
        let report = tools::install_missing(&runner)
            .await
            .context("Failed to install external tools")?;
        println!();
        println!(
            "{}",
            format!(
                "[+] Installed: {}  Skipped: {}  Failed: {}",
                report.installed.len(),
                report.skipped.len(),
                report.failed.len()
            )
            .green()
            .bold()
        );
        return Ok(());
    }

    let targets = match TargetSource::from_options(args.domain.clone(), args.file.clone())
        .and_then(|source| load_targets(&source))
    {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("{}", format!("[!] {}", e).red().bold());
            eprintln!("{}", "    Usage: reconrust -d example.com | -f domains.txt".yellow());
            std::process::exit(1);
        }
    };

    let config = args.pipeline_config();
    println!(
        "{}",
        format!(
            "[*] {} target(s), output in {}",
            targets.len(),
            config.output_root.display()
        )
        .cyan()
    );

    let mut console = ConsoleObserver::new().verbose(args.verbose);
    let bar = (targets.len() > 1).then(|| target_progress_bar(targets.len()));
    if let Some(ref bar) = bar {
        console = console.with_progress_bar(bar.clone());
    }

    let observer = Fanout::new()
        .with(Arc::new(console))
        .with(Arc::new(EventLog::new(OutputWriter::new(&config.output_root))));

    let output_root = config.output_root.clone();
    let pipeline = Pipeline::new(runner, Arc::new(observer), config)
        .context("Failed to initialise recon pipeline")?;

    let report = pipeline.run_all(&targets).await;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    print_run_summary(&report, &output_root);

    Ok(())
}

fn target_progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} targets ({elapsed})") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn print_banner() {
    println!("{}", "╔═══════════════════════════════════════════════╗".cyan().bold());
    println!("{}", "║        RECONRUST - Recon Orchestration        ║".cyan().bold());
    println!("{}", "╚═══════════════════════════════════════════════╝".cyan().bold());
    println!();
}

fn print_run_summary(report: &RunReport, output_root: &Path) {
    println!();
    println!("{}", "═══════════════════════════════════════════════".cyan());
    for summary in &report.completed {
        println!(
            "{}",
            format!(
                "[+] {} ({:.1}s): {} subs, {} urls, {} tools run, {} skipped, {} failed",
                summary.target,
                summary.duration_seconds,
                summary.artifact_count(reconrust::output::SUBS_FILE).unwrap_or(0),
                summary.artifact_count(reconrust::output::URLS_FILE).unwrap_or(0),
                summary.tools_run.len(),
                summary.tools_skipped.len(),
                summary.tools_failed.len()
            )
            .green()
        );
    }
    for (target, error) in &report.failed {
        println!("{}", format!("[!] {}: {}", target, error).red());
    }
    println!(
        "{}",
        format!("[*] Results saved under {}/", output_root.display()).cyan().bold()
    );
}
