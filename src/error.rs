// error.rs - Error taxonomy for the recon pipeline

use thiserror::Error;

/// Everything that can go wrong while resolving targets, running tools or
/// writing artifacts.
///
/// Only `Configuration` is fatal for a whole run and `Io` is fatal for a
/// single target. The rest are contained by the pipeline and turned into
/// "no data produced" for the step that raised them.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("tool not available: {0}")]
    ToolUnavailable(String),

    #[error("{program} failed: {reason}")]
    ToolExecution { program: String, reason: String },

    #[error("could not parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReconError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn execution(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolExecution {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Soft failures never abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Io(_))
    }
}

pub type Result<T, E = ReconError> = std::result::Result<T, E>;
