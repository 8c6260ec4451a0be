// targets.rs - Target resolution from a literal domain or a domain list file

use crate::error::{ReconError, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A root domain the pipeline runs against.
///
/// The name doubles as the per-target output directory, so it is always a
/// plain hostname: no separators, no `..`, no leading `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target(String);

impl Target {
    /// Validate `domain` as a hostname.
    pub fn parse(domain: &str) -> Result<Self> {
        let domain = domain.trim();
        let invalid = |reason: &str| {
            ReconError::configuration(format!("invalid target '{}': {}", domain, reason))
        };

        if domain.is_empty() {
            return Err(invalid("empty name"));
        }
        if domain.len() > MAX_HOSTNAME_LEN {
            return Err(invalid("name longer than 253 characters"));
        }
        if domain.contains(['/', '\\']) {
            return Err(invalid("path separators are not allowed"));
        }

        for label in domain.split('.') {
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(invalid("label longer than 63 characters"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(invalid("label starts or ends with '-'"));
            }
            if !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(invalid("only letters, digits, '-' and '_' are allowed"));
            }
        }

        Ok(Self(domain.to_string()))
    }

    /// Wrap a name that is already known to be valid.
    pub(crate) fn new(domain: impl Into<String>) -> Self {
        Self(domain.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where the target list comes from. `-d` and `-f` are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    Domain(String),
    File(PathBuf),
}

impl TargetSource {
    pub fn from_options(domain: Option<String>, file: Option<PathBuf>) -> Result<Self> {
        match (domain, file) {
            (Some(_), Some(_)) => Err(ReconError::configuration(
                "use either -d/--domain or -f/--file, not both",
            )),
            (Some(domain), None) => {
                if domain.trim().is_empty() {
                    Err(ReconError::configuration("empty domain supplied"))
                } else {
                    Ok(Self::Domain(domain))
                }
            }
            (None, Some(file)) => Ok(Self::File(file)),
            (None, None) => Err(ReconError::configuration(
                "no target supplied: use -d/--domain <domain> or -f/--file <path>",
            )),
        }
    }
}

/// Resolve the source into a deduplicated, order-preserving target list.
///
/// File lines are trimmed; blank lines and `#` comments are skipped. Any
/// entry that is not a plain hostname rejects the whole list.
pub fn load_targets(source: &TargetSource) -> Result<Vec<Target>> {
    let raw: Vec<String> = match source {
        TargetSource::Domain(domain) => vec![domain.trim().to_string()],
        TargetSource::File(path) => {
            if !path.is_file() {
                return Err(ReconError::configuration(format!(
                    "target file not found: {}",
                    path.display()
                )));
            }
            std::fs::read_to_string(path)?
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .collect()
        }
    };

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for domain in raw {
        if seen.insert(domain.clone()) {
            targets.push(Target::parse(&domain)?);
        }
    }

    if targets.is_empty() {
        return Err(ReconError::configuration("no targets found in input"));
    }

    Ok(targets)
}
