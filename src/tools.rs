// tools.rs - External tool catalogue, status check and explicit installation
// Purpose: `--check-tools` reports what is installed; `--install-tools`
//          installs the missing Go tools. Nothing here runs implicitly.

use crate::error::{ReconError, Result};
use crate::runner::{CommandRunner, Invocation, discover_tool_path};
use colored::*;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRole {
    SubdomainEnumeration,
    UrlMining,
    LivenessProbe,
    PatternMatching,
}

impl ToolRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SubdomainEnumeration => "subdomains",
            Self::UrlMining => "urls",
            Self::LivenessProbe => "liveness",
            Self::PatternMatching => "patterns",
        }
    }
}

#[derive(Debug)]
pub struct ToolInfo {
    pub name: &'static str,
    pub binary: &'static str,
    pub description: &'static str,
    pub role: ToolRole,
    pub go_package: &'static str,
}

pub const TOOLS: &[ToolInfo] = &[
    ToolInfo {
        name: "subfinder",
        binary: "subfinder",
        description: "Passive subdomain discovery",
        role: ToolRole::SubdomainEnumeration,
        go_package: "github.com/projectdiscovery/subfinder/v2/cmd/subfinder",
    },
    ToolInfo {
        name: "assetfinder",
        binary: "assetfinder",
        description: "Related domains and subdomains",
        role: ToolRole::SubdomainEnumeration,
        go_package: "github.com/tomnomnom/assetfinder",
    },
    ToolInfo {
        name: "gau",
        binary: "gau",
        description: "Known URLs from AlienVault, Wayback, Common Crawl",
        role: ToolRole::UrlMining,
        go_package: "github.com/lc/gau/v2/cmd/gau",
    },
    ToolInfo {
        name: "waybackurls",
        binary: "waybackurls",
        description: "URLs from the Wayback Machine",
        role: ToolRole::UrlMining,
        go_package: "github.com/tomnomnom/waybackurls",
    },
    ToolInfo {
        name: "httpx",
        binary: "httpx",
        description: "HTTP probing of hosts and URL status codes",
        role: ToolRole::LivenessProbe,
        go_package: "github.com/projectdiscovery/httpx/cmd/httpx",
    },
    ToolInfo {
        name: "httprobe",
        binary: "httprobe",
        description: "Fallback HTTP/HTTPS prober",
        role: ToolRole::LivenessProbe,
        go_package: "github.com/tomnomnom/httprobe",
    },
    ToolInfo {
        name: "gf",
        binary: "gf",
        description: "Grep wrapper with xss/sqli/lfi/rce/redirect patterns",
        role: ToolRole::PatternMatching,
        go_package: "github.com/tomnomnom/gf",
    },
];

#[derive(Debug)]
pub struct ToolStatus {
    pub tool: &'static ToolInfo,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn installed(&self) -> bool {
        self.path.is_some()
    }
}

fn ansi_pattern() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI regex"))
}

pub fn strip_ansi_codes(s: &str) -> String {
    ansi_pattern().replace_all(s, "").into_owned()
}

/// First non-empty line of `-version` / `--version` output, without colors.
pub async fn tool_version<R: CommandRunner>(runner: &R, binary: &str) -> Option<String> {
    for flag in ["-version", "--version"] {
        let invocation = Invocation::new(binary).arg(flag).timeout(VERSION_TIMEOUT);
        if let Ok(out) = runner.execute(&invocation).await {
            if let Some(line) = out.lines().map(|l| strip_ansi_codes(l.trim())).find(|l| !l.is_empty()) {
                return Some(line);
            }
        }
    }
    None
}

pub async fn check_tools<R: CommandRunner>(runner: &R) -> Vec<ToolStatus> {
    let mut statuses = Vec::with_capacity(TOOLS.len());
    for tool in TOOLS {
        let path = discover_tool_path(tool.binary);
        let version = if runner.is_available(tool.binary) {
            tool_version(runner, tool.binary).await
        } else {
            None
        };
        statuses.push(ToolStatus { tool, path, version });
    }
    statuses
}

pub fn print_tool_status(statuses: &[ToolStatus]) {
    println!("{}", "[*] External tool status".cyan().bold());
    for status in statuses {
        let tool = status.tool;
        if status.installed() {
            let path = status
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "  {} {:<12} {:<11} {} {}",
                "✓".green().bold(),
                tool.name.green(),
                tool.role.label().dimmed(),
                path.dimmed(),
                status.version.as_deref().unwrap_or("").dimmed()
            );
        } else {
            println!(
                "  {} {:<12} {:<11} {}",
                "✗".red().bold(),
                tool.name.red(),
                tool.role.label().dimmed(),
                tool.description.dimmed()
            );
        }
    }

    let missing = statuses.iter().filter(|s| !s.installed()).count();
    if missing > 0 {
        println!();
        println!(
            "{}",
            format!("[!] {} tool(s) missing; stages needing them will be skipped. Run with --install-tools.", missing)
                .yellow()
        );
    }
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

/// `go install <package>@latest` for every catalogue tool that is not
/// already available. Requires a Go toolchain.
pub async fn install_missing<R: CommandRunner>(runner: &R) -> Result<InstallReport> {
    if !runner.is_available("go") {
        return Err(ReconError::configuration(
            "Go toolchain not found; install Go from https://go.dev/dl/ first",
        ));
    }

    let mut report = InstallReport::default();
    for tool in TOOLS {
        if runner.is_available(tool.binary) {
            println!("{}", format!("[-] {} already installed, skipping", tool.name).dimmed());
            report.skipped.push(tool.name);
            continue;
        }

        println!("{}", format!("[*] Installing {}...", tool.name).cyan());
        let invocation = Invocation::new("go")
            .args(["install", "-v"])
            .arg(format!("{}@latest", tool.go_package))
            .timeout(INSTALL_TIMEOUT);

        match runner.execute(&invocation).await {
            Ok(_) => {
                println!("{}", format!("[+] {} installed", tool.name).green());
                report.installed.push(tool.name);
            }
            Err(e) => {
                println!("{}", format!("[!] {} failed: {}", tool.name, e).red());
                report.failed.push((tool.name, e.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::GF_PROGRAM;
    use crate::collect::{LIVENESS_PROBERS, SUBDOMAIN_TOOLS, URL_STATUS_PROBER, URL_TOOLS};
    use crate::runner::testing::FakeRunner;

    #[test]
    fn test_catalogue_covers_pipeline_tools() {
        let binaries: Vec<_> = TOOLS.iter().map(|t| t.binary).collect();
        let specs = SUBDOMAIN_TOOLS
            .iter()
            .chain(URL_TOOLS)
            .chain(LIVENESS_PROBERS)
            .chain(std::iter::once(&URL_STATUS_PROBER));
        for spec in specs {
            assert!(binaries.contains(&spec.program), "{} missing from catalogue", spec.program);
        }
        assert!(binaries.contains(&GF_PROGRAM));
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[34mv2.6.3\x1b[0m"), "v2.6.3");
        assert_eq!(strip_ansi_codes("plain"), "plain");
    }

    #[tokio::test]
    async fn test_tool_version_falls_back_to_long_flag() {
        let runner = FakeRunner::default()
            .with_failure("subfinder -version", "unknown flag")
            .with_output("subfinder --version", "\n\x1b[1mCurrent Version: v2.6.3\x1b[0m\n");
        let version = tool_version(&runner, "subfinder").await;
        assert_eq!(version.as_deref(), Some("Current Version: v2.6.3"));
    }

    #[tokio::test]
    async fn test_install_requires_go() {
        let err = install_missing(&FakeRunner::default()).await.unwrap_err();
        assert!(matches!(err, ReconError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_install_only_missing_tools() {
        let runner = FakeRunner::default()
            .with_output("go", "")
            .with_output("subfinder", "")
            .with_failure("go install -v github.com/tomnomnom/gf@latest", "network unreachable");

        let report = install_missing(&runner).await.unwrap();

        assert_eq!(report.skipped, vec!["subfinder"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "gf");
        assert_eq!(report.installed.len(), TOOLS.len() - 2);

        let calls = runner.calls_to("go");
        assert_eq!(calls.len(), TOOLS.len() - 1);
        assert_eq!(
            calls[0].args,
            vec!["install", "-v", "github.com/tomnomnom/assetfinder@latest"]
        );
    }
}
