use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::common::constants::published_relations;
use crate::common::error::{PipelineError, Result};
use crate::config::Config;
use crate::observability::metrics;
use crate::pipeline::processing::conform::ConformanceEngine;
use crate::pipeline::processing::model::{CustomerKeyNormalizer, ModelingEngine};
use crate::pipeline::processing::reconcile::{ReconciliationEngine, ReconciliationReport, RECONCILIATION};
use crate::pipeline::run::{RunContext, Stage, StepOutcome};
use crate::storage::{RawStagingStore, RelationStore, RunGuard};

/// Everything a batch run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub context: RunContext,
    /// Present when reconciliation ran
    pub report: Option<ReconciliationReport>,
    pub failed_stage: Option<Stage>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failed_stage.is_none() && self.context.succeeded()
    }

    /// Process exit status: 1 when a stage failed, 2 when reconciliation found
    /// errors and `fail_on_findings` is set, otherwise 0
    pub fn exit_status(&self, fail_on_findings: bool) -> u8 {
        if self.failed_stage.is_some() {
            return 1;
        }
        if fail_on_findings && self.report.as_ref().is_some_and(|r| r.has_errors()) {
            return 2;
        }
        0
    }
}

/// Sequences the engines over one set of stores.
/// Engines run strictly one after another; a structural failure stops the run
/// and every later stage is recorded as skipped.
pub struct BatchRunner {
    raw: Arc<dyn RawStagingStore>,
    conformed: Arc<dyn RelationStore>,
    published: Arc<dyn RelationStore>,
    conformance: ConformanceEngine,
    modeling: ModelingEngine,
    reconciliation: ReconciliationEngine,
}

impl BatchRunner {
    pub fn new(
        raw: Arc<dyn RawStagingStore>,
        conformed: Arc<dyn RelationStore>,
        published: Arc<dyn RelationStore>,
    ) -> Self {
        Self {
            raw,
            conformed,
            published,
            conformance: ConformanceEngine::default(),
            modeling: ModelingEngine::default(),
            reconciliation: ReconciliationEngine::new(),
        }
    }

    /// Runner whose engines follow the key settings in `config`
    pub fn from_config(
        config: &Config,
        raw: Arc<dyn RawStagingStore>,
        conformed: Arc<dyn RelationStore>,
        published: Arc<dyn RelationStore>,
    ) -> Self {
        Self::new(raw, conformed, published)
            .with_modeling(ModelingEngine::new(CustomerKeyNormalizer::from_config(&config.keys)))
    }

    pub fn with_conformance(mut self, conformance: ConformanceEngine) -> Self {
        self.conformance = conformance;
        self
    }

    pub fn with_modeling(mut self, modeling: ModelingEngine) -> Self {
        self.modeling = modeling;
        self
    }

    /// Claim both writable stores for the duration of a run
    fn begin(&self) -> Result<(RunGuard, RunGuard)> {
        let conformed = self.conformed.try_begin_run()?;
        let published = self.published.try_begin_run()?;
        Ok((conformed, published))
    }

    /// Conform, model and reconcile in order.
    /// Errors only when the stores are already claimed by another run.
    #[instrument(skip(self))]
    pub async fn run(&self, run_date: Option<NaiveDate>) -> Result<RunSummary> {
        let _guards = self.begin()?;
        let mut ctx = RunContext::for_date(run_date);
        let started = Instant::now();
        info!("🚀 Batch run {} starting (run date {})", ctx.run_id, ctx.run_date);

        let mut failed_stage = None;
        let mut report = None;

        if let Err(e) = self.conform_stage(&mut ctx).await {
            failed_stage = Some(stage_failed(Stage::Conform, &e));
        }

        if failed_stage.is_none() {
            if let Err(e) = self.model_stage(&mut ctx).await {
                failed_stage = Some(stage_failed(Stage::Model, &e));
            }
        }

        if failed_stage.is_none() {
            match self.reconcile_stage(&mut ctx).await {
                Ok(r) => report = Some(r),
                Err(e) => failed_stage = Some(stage_failed(Stage::Reconcile, &e)),
            }
        }

        if let Some(failed) = failed_stage {
            mark_skipped_after(&mut ctx, failed);
            warn!(
                "Batch run {} stopped at {} after {:.2}s",
                ctx.run_id,
                failed,
                started.elapsed().as_secs_f64()
            );
        } else {
            info!(
                "✅ Batch run {} completed in {:.2}s",
                ctx.run_id,
                started.elapsed().as_secs_f64()
            );
        }

        Ok(RunSummary {
            context: ctx,
            report,
            failed_stage,
        })
    }

    /// Run a single stage against whatever the stores currently hold
    pub async fn run_stage(&self, stage: Stage, run_date: Option<NaiveDate>) -> Result<RunSummary> {
        let mut ctx = RunContext::for_date(run_date);
        let mut report = None;

        let result = match stage {
            Stage::Conform | Stage::Model => {
                let _guards = self.begin()?;
                if stage == Stage::Conform {
                    self.conform_stage(&mut ctx).await
                } else {
                    self.model_stage(&mut ctx).await
                }
            }
            Stage::Reconcile => self.reconcile_stage(&mut ctx).await.map(|r| {
                report = Some(r);
            }),
        };

        let failed_stage = result.err().map(|e| stage_failed(stage, &e));
        Ok(RunSummary {
            context: ctx,
            report,
            failed_stage,
        })
    }

    async fn conform_stage(&self, ctx: &mut RunContext) -> Result<()> {
        self.conformance
            .run(self.raw.clone(), self.conformed.clone(), ctx)
            .await
    }

    async fn model_stage(&self, ctx: &mut RunContext) -> Result<()> {
        self.modeling
            .run(self.conformed.clone(), self.published.clone(), ctx)
            .await
    }

    async fn reconcile_stage(&self, ctx: &mut RunContext) -> Result<ReconciliationReport> {
        self.reconciliation
            .run(self.conformed.clone(), self.published.clone(), ctx)
            .await
    }
}

fn stage_failed(stage: Stage, e: &PipelineError) -> Stage {
    error!("❌ Stage {} failed: {}", stage, e);
    metrics::run::stage_failed(stage.as_str());
    stage
}

/// Record a skipped outcome for every stage after `failed`
fn mark_skipped_after(ctx: &mut RunContext, failed: Stage) {
    let mut later: Vec<(Stage, &str)> = Vec::new();
    if failed == Stage::Conform {
        later.extend(published_relations().into_iter().map(|r| (Stage::Model, r)));
    }
    if failed != Stage::Reconcile {
        later.push((Stage::Reconcile, RECONCILIATION));
    }
    for (stage, entity) in later {
        ctx.record(StepOutcome::skipped(
            stage,
            entity,
            format!("skipped after {} failed", failed),
        ));
    }
}
