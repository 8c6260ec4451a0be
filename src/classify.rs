// classify.rs - Classification and filtering of collected subdomains/URLs
// Purpose: Stateless classifiers (JS, PHP, keyword interest, query parameters)
//          plus the gf pattern categories delegated to the external tool

use crate::collect::ResultSet;
use crate::runner::Invocation;
use std::fmt;
use url::Url;

/// Substrings that flag an endpoint or host as worth a closer look.
pub const INTEREST_KEYWORDS: &[&str] = &["login", "rest", "password", "update", "admin"];

/// gf pattern names; each produces `gf_{pattern}.txt`.
pub const GF_PATTERNS: &[&str] = &["xss", "sqli", "lfi", "rce", "redirect"];

pub const GF_PROGRAM: &str = "gf";

/// Entries ending in `.js` (ASCII case-insensitive).
pub fn filter_js(set: &ResultSet) -> ResultSet {
    set.iter()
        .filter(|u| is_js(u))
        .cloned()
        .collect()
}

/// Entries containing `.php` anywhere, so `.phps` and `index.php?id=1` match too.
pub fn filter_php(set: &ResultSet) -> ResultSet {
    set.iter()
        .filter(|u| is_php(u))
        .cloned()
        .collect()
}

/// Entries containing any of [`INTEREST_KEYWORDS`] (ASCII case-insensitive).
pub fn filter_interesting(set: &ResultSet) -> ResultSet {
    set.iter()
        .filter(|u| is_interesting(u))
        .cloned()
        .collect()
}

pub fn is_js(entry: &str) -> bool {
    entry.to_ascii_lowercase().ends_with(".js")
}

pub fn is_php(entry: &str) -> bool {
    entry.to_ascii_lowercase().contains(".php")
}

pub fn is_interesting(entry: &str) -> bool {
    let lower = entry.to_ascii_lowercase();
    INTEREST_KEYWORDS.iter().any(|k| lower.contains(k))
}

// ═══════════════════════════════════════════════════════════════════════════
// QUERY PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterEntry {
    pub url: String,
    pub name: String,
    /// All values seen for `name` in this URL, comma-joined.
    pub values: String,
}

impl fmt::Display for ParameterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}={}", self.url, self.name, self.values)
    }
}

#[derive(Debug, Default)]
pub struct ParameterReport {
    pub entries: Vec<ParameterEntry>,
    /// URLs that could not be parsed, with the parser's reason.
    pub rejected: Vec<(String, String)>,
}

/// One entry per (URL, key). Keys keep the order they first appear in.
pub fn extract_parameters(urls: &ResultSet) -> ParameterReport {
    let mut report = ParameterReport::default();

    for raw in urls {
        let parsed = match Url::parse(raw) {
            Ok(u) => u,
            Err(e) => {
                report.rejected.push((raw.clone(), e.to_string()));
                continue;
            }
        };

        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (key, value) in parsed.query_pairs() {
            match grouped.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value.into_owned()),
                None => grouped.push((key.into_owned(), vec![value.into_owned()])),
            }
        }

        report
            .entries
            .extend(grouped.into_iter().map(|(name, values)| ParameterEntry {
                url: raw.clone(),
                name,
                values: values.join(","),
            }));
    }

    report
}

// ═══════════════════════════════════════════════════════════════════════════
// GF DELEGATION
// ═══════════════════════════════════════════════════════════════════════════

/// `gf <pattern>` with the URL list on stdin.
pub fn gf_invocation(pattern: &str, urls: &ResultSet) -> Invocation {
    Invocation::new(GF_PROGRAM).arg(pattern).stdin(urls.to_text())
}

pub fn gf_artifact(pattern: &str) -> String {
    format!("gf_{}.txt", pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(entries: &[&str]) -> ResultSet {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_js_filter_suffix_only() {
        let urls = set(&[
            "https://x.com/static/app.js",
            "https://x.com/static/APP.JS",
            "https://x.com/app.js?v=2",
            "https://x.com/app.json",
            "https://x.com/index.html",
        ]);
        let js = filter_js(&urls);
        assert_eq!(js.len(), 2);
        assert!(js.iter().all(|u| u.to_ascii_lowercase().ends_with(".js")));
        assert!(!js.contains("https://x.com/app.json"));
    }

    #[test]
    fn test_php_filter_is_substring_match() {
        let urls = set(&[
            "https://x/a.phps",
            "https://x/index.php?id=1",
            "https://x/about.html",
        ]);
        let php = filter_php(&urls);
        assert!(php.contains("https://x/a.phps"));
        assert!(php.contains("https://x/index.php?id=1"));
        assert!(!php.contains("https://x/about.html"));
    }

    #[test]
    fn test_interest_filter_keywords() {
        let urls = set(&[
            "https://x/Login",
            "https://x/api/rest/v1",
            "https://x/reset-password",
            "https://x/account/update",
            "https://admin.x.com",
            "https://x/blog/post",
        ]);
        let hits = filter_interesting(&urls);
        assert_eq!(hits.len(), 5);
        assert!(!hits.contains("https://x/blog/post"));
    }

    #[test]
    fn test_classifiers_fold_ascii_case_alike() {
        assert!(is_js("https://X.COM/ADMIN/App.JS"));
        assert!(is_interesting("https://X.COM/ADMIN/App.JS"));
        assert!(is_php("https://X.COM/LOGIN.PHP?ID=1"));
        assert!(is_interesting("https://X.COM/LOGIN.PHP?ID=1"));
        // Non-ASCII letters are left alone by every classifier.
        assert!(!is_interesting("https://x.com/\u{0130}nfo/ADM\u{0130}N"));
    }

    #[test]
    fn test_interest_filter_idempotent() {
        let urls = set(&["https://x/login", "https://x/home", "https://x/admin/panel"]);
        let once = filter_interesting(&urls);
        let twice = filter_interesting(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_extract_parameters_comma_joined() {
        let report = extract_parameters(&set(&["https://a/b?x=1&y=2,3"]));
        assert!(report.rejected.is_empty());
        assert_eq!(
            report.entries,
            vec![
                ParameterEntry {
                    url: "https://a/b?x=1&y=2,3".into(),
                    name: "x".into(),
                    values: "1".into(),
                },
                ParameterEntry {
                    url: "https://a/b?x=1&y=2,3".into(),
                    name: "y".into(),
                    values: "2,3".into(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_parameters_repeated_key() {
        let report = extract_parameters(&set(&["https://a/s?q=one&page=2&q=two"]));
        let names: Vec<_> = report.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["q", "page"]);
        assert_eq!(report.entries[0].values, "one,two");
    }

    #[test]
    fn test_extract_parameters_skips_unparseable() {
        let report = extract_parameters(&set(&[
            "not a url",
            "https://a/plain",
            "https://a/p?id=7",
        ]));
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "not a url");
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].to_string(), "https://a/p?id=7 | id=7");
    }

    #[test]
    fn test_empty_input_yields_empty_outputs() {
        let empty = ResultSet::new();
        assert!(filter_js(&empty).is_empty());
        assert!(filter_php(&empty).is_empty());
        assert!(filter_interesting(&empty).is_empty());
        let report = extract_parameters(&empty);
        assert!(report.entries.is_empty() && report.rejected.is_empty());
    }

    #[test]
    fn test_gf_invocation_pipes_urls() {
        let inv = gf_invocation("xss", &set(&["https://a/?q=1"]));
        assert_eq!(inv.program, "gf");
        assert_eq!(inv.args, vec!["xss"]);
        assert_eq!(inv.stdin.as_deref(), Some("https://a/?q=1\n"));
        assert_eq!(gf_artifact("xss"), "gf_xss.txt");
    }
}
