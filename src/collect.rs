// collect.rs - Collection stage
// Purpose: Tool catalogue for subdomain/URL discovery and liveness probing,
//          the ResultSet they merge into, and the crt.sh certificate source

use crate::error::{ReconError, Result};
use crate::runner::Invocation;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::collections::btree_set;
use std::time::Duration;

/// Deduplicated, sorted set of subdomains or URLs for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet(BTreeSet<String>);

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from newline-delimited tool output, trimming and dropping blanks.
    pub fn from_lines(text: &str) -> Self {
        let mut set = Self::new();
        set.extend_lines(text);
        set
    }

    pub fn extend_lines(&mut self, text: &str) {
        self.0.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }

    pub fn insert(&mut self, entry: impl Into<String>) -> bool {
        self.0.insert(entry.into())
    }

    pub fn merge(&mut self, other: ResultSet) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.contains(entry)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    /// Newline-joined, suitable for feeding to a tool's stdin.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.0 {
            text.push_str(entry);
            text.push('\n');
        }
        text
    }
}

impl FromIterator<String> for ResultSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ResultSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl IntoIterator for ResultSet {
    type Item = String;
    type IntoIter = btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TOOL CATALOGUE
// ═══════════════════════════════════════════════════════════════════════════

const DOMAIN_PLACEHOLDER: &str = "{domain}";

/// An external discovery tool and how to call it for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl ToolSpec {
    /// Invocation for a single domain passed as an argument.
    pub fn for_domain(&self, domain: &str) -> Invocation {
        Invocation::new(self.program).args(
            self.args
                .iter()
                .map(|a| a.replace(DOMAIN_PLACEHOLDER, domain)),
        )
    }

    /// Invocation that reads its domain/host list from stdin instead.
    pub fn for_stdin(&self, input: String) -> Invocation {
        Invocation::new(self.program)
            .args(self.args.iter().filter(|a| !a.contains(DOMAIN_PLACEHOLDER)).copied())
            .stdin(input)
    }
}

pub const SUBDOMAIN_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "subfinder",
        program: "subfinder",
        args: &["-d", "{domain}", "-silent"],
    },
    ToolSpec {
        name: "assetfinder",
        program: "assetfinder",
        args: &["--subs-only", "{domain}"],
    },
];

pub const URL_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "gau",
        program: "gau",
        args: &["{domain}"],
    },
    ToolSpec {
        name: "waybackurls",
        program: "waybackurls",
        args: &["{domain}"],
    },
];

/// Tried in order; the first one installed probes the subdomain list.
pub const LIVENESS_PROBERS: &[ToolSpec] = &[
    ToolSpec {
        name: "httpx",
        program: "httpx",
        args: &["-silent"],
    },
    ToolSpec {
        name: "httprobe",
        program: "httprobe",
        args: &[],
    },
];

/// Probes the URL list on stdin and prints `url [status]` for every URL that
/// answered. httprobe reports no status codes, so there is no fallback.
pub const URL_STATUS_PROBER: ToolSpec = ToolSpec {
    name: "httpx-urls",
    program: "httpx",
    args: &["-silent", "-status-code", "-no-color"],
};

pub const FORBIDDEN_STATUS: u16 = 403;

/// Parsed output of [`URL_STATUS_PROBER`].
#[derive(Debug, Default)]
pub struct StatusReport {
    /// Every URL that answered, whatever the status.
    pub live: ResultSet,
    /// URLs that answered 403.
    pub forbidden: ResultSet,
    /// Lines without a trailing `[code]`, with the reason.
    pub rejected: Vec<(String, String)>,
}

/// Split `https://host/path [403]` lines into live and forbidden sets.
/// With redirects httpx prints a chain (`[301,200]`); the first code is the
/// URL's own response.
pub fn parse_status_lines(output: &str) -> StatusReport {
    let mut report = StatusReport::default();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed = line.rsplit_once(' ').and_then(|(url, codes)| {
            let code = codes
                .strip_prefix('[')?
                .strip_suffix(']')?
                .split(',')
                .next()?
                .trim()
                .parse::<u16>()
                .ok()?;
            Some((url.trim(), code))
        });

        match parsed {
            Some((url, code)) => {
                report.live.insert(url);
                if code == FORBIDDEN_STATUS {
                    report.forbidden.insert(url);
                }
            }
            None => report
                .rejected
                .push((line.to_string(), "missing [status] suffix".to_string())),
        }
    }

    report
}

// ═══════════════════════════════════════════════════════════════════════════
// CRT.SH CERTIFICATE TRANSPARENCY
// ═══════════════════════════════════════════════════════════════════════════

pub const CRTSH_SOURCE: &str = "crt.sh";
pub const CRTSH_ENDPOINT: &str = "https://crt.sh";
const CRTSH_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_PREVIEW: usize = 80;

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: Option<String>,
    common_name: Option<String>,
}

pub fn crtsh_client() -> Result<Client> {
    Ok(Client::builder().timeout(CRTSH_TIMEOUT).build()?)
}

/// Query crt.sh (or a compatible `endpoint`) for certificates issued under
/// `domain`.
pub async fn query_crtsh(client: &Client, endpoint: &str, domain: &str) -> Result<ResultSet> {
    let url = format!(
        "{}/?q=%25{}&output=json",
        endpoint.trim_end_matches('/'),
        domain
    );
    let body = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_crtsh(&body, domain)
}

/// Names from a crt.sh JSON body that belong to `domain`. Wildcard prefixes
/// are stripped. Anything that is not the JSON entry list (rate-limit pages,
/// HTML errors) is a `Parse` error.
pub fn parse_crtsh(body: &str, domain: &str) -> Result<ResultSet> {
    let entries: Vec<CrtShEntry> = serde_json::from_str(body).map_err(|e| ReconError::Parse {
        input: body.trim().chars().take(BODY_PREVIEW).collect(),
        reason: format!("crt.sh response is not JSON: {}", e),
    })?;
    let domain = domain.to_lowercase();
    let suffix = format!(".{}", domain);

    let names = entries
        .into_iter()
        .filter_map(|e| e.name_value.or(e.common_name))
        .flat_map(|names| {
            names
                .lines()
                .map(|l| l.trim().trim_start_matches(['*', '.']).to_lowercase())
                .collect::<Vec<_>>()
        })
        .filter(|name| *name == domain || name.ends_with(&suffix))
        .collect();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_set_dedups_and_sorts() {
        let set = ResultSet::from_lines("b.example.com\n  a.example.com \n\nb.example.com\n");
        let entries: Vec<_> = set.iter().cloned().collect();
        assert_eq!(entries, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_merge_unions_sources() {
        let mut set = ResultSet::from_lines("www.example.com\n");
        set.merge(ResultSet::from_lines("www.example.com\napi.example.com\n"));
        assert_eq!(set.len(), 2);
        assert!(set.contains("api.example.com"));
    }

    #[test]
    fn test_to_text_newline_terminated() {
        let set: ResultSet = ["b", "a"].into_iter().collect();
        assert_eq!(set.to_text(), "a\nb\n");
        assert_eq!(ResultSet::new().to_text(), "");
    }

    #[test]
    fn test_domain_substitution() {
        let inv = SUBDOMAIN_TOOLS[0].for_domain("example.com");
        assert_eq!(inv.program, "subfinder");
        assert_eq!(inv.args, vec!["-d", "example.com", "-silent"]);
        assert!(inv.stdin.is_none());
    }

    #[test]
    fn test_stdin_form_drops_domain_argument() {
        let inv = URL_TOOLS[1].for_stdin("a.example.com\n".to_string());
        assert_eq!(inv.program, "waybackurls");
        assert!(inv.args.is_empty());
        assert_eq!(inv.stdin.as_deref(), Some("a.example.com\n"));
    }

    #[test]
    fn test_status_lines_split_live_and_forbidden() {
        let out = "https://example.com/admin [403]\n\
                   https://example.com/ [200]\n\
                   https://example.com/old [301,200]\n\
                   https://example.com/admin [403]\n\
                   garbage-line\n\
                   https://example.com/x [abc]\n";
        let report = parse_status_lines(out);

        let live: Vec<_> = report.live.iter().cloned().collect();
        assert_eq!(
            live,
            vec![
                "https://example.com/",
                "https://example.com/admin",
                "https://example.com/old"
            ]
        );
        let forbidden: Vec<_> = report.forbidden.into_iter().collect();
        assert_eq!(forbidden, vec!["https://example.com/admin"]);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].0, "garbage-line");
    }

    #[test]
    fn test_status_prober_reads_stdin() {
        let inv = URL_STATUS_PROBER.for_stdin("https://example.com/\n".to_string());
        assert_eq!(inv.program, "httpx");
        assert_eq!(inv.args, vec!["-silent", "-status-code", "-no-color"]);
    }

    #[test]
    fn test_parse_crtsh_filters_and_strips_wildcards() {
        let body = r#"[
            {"name_value": "*.example.com\nwww.example.com"},
            {"name_value": "API.Example.com"},
            {"common_name": "mail.example.com"},
            {"name_value": "notexample.com\nevil.org"}
        ]"#;
        let set = parse_crtsh(body, "example.com").unwrap();
        let entries: Vec<_> = set.into_iter().collect();
        assert_eq!(
            entries,
            vec!["api.example.com", "example.com", "mail.example.com", "www.example.com"]
        );
    }

    #[test]
    fn test_parse_crtsh_malformed_body() {
        let err = parse_crtsh("<html>rate limited</html>", "example.com").unwrap_err();
        match err {
            ReconError::Parse { input, reason } => {
                assert_eq!(input, "<html>rate limited</html>");
                assert!(reason.contains("crt.sh"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_crtsh_empty_list() {
        assert!(parse_crtsh("[]", "example.com").unwrap().is_empty());
    }
}
