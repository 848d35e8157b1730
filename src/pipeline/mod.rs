// Batch pipeline: conformance, modeling and reconciliation over the stores

pub mod orchestrator;
pub mod processing;
pub mod run;

pub use orchestrator::{BatchRunner, RunSummary};
pub use processing::conform::ConformanceEngine;
pub use processing::model::ModelingEngine;
pub use processing::reconcile::{ReconciliationEngine, ReconciliationReport};
pub use run::{RunContext, Stage, StepOutcome, StepStatus};
