pub mod common;
pub mod config;
pub mod pipeline;
pub mod storage;

// Domain data shapes shared across layers
pub mod domain;

pub mod observability;

pub use common::error::{PipelineError, Result};
pub use config::Config;
pub use pipeline::{BatchRunner, RunContext, RunSummary, Stage};
