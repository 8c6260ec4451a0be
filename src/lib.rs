// lib.rs - reconrust library
// Purpose: Recon orchestration around external discovery tools: collect
//          subdomains and URLs, classify them, write per-target artifacts

pub mod classify;
pub mod collect;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod targets;
pub mod tools;

pub use error::{ReconError, Result};
pub use pipeline::{Pipeline, PipelineConfig, RunReport, Stages, UrlMode};
pub use targets::{Target, TargetSource};
