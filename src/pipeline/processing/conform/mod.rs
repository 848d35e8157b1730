//! Conformance engine: raw staging rows to one cleansed record per business key.

pub mod conformers;
pub mod dedup;
pub mod intervals;
pub mod measures;
pub mod registry;
pub mod rules;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::common::error::{PipelineError, Result};
use crate::domain::RawRecord;
use crate::observability::metrics;
use crate::pipeline::run::{RunContext, Stage, StepOutcome};
use crate::storage::{RawStagingStore, RelationStore, Row};

pub use dedup::{latest_per_key, Candidate, Deduplicated};
pub use registry::ConformerRegistry;
pub use rules::{CodeMap, Parsed};

/// Run-scoped inputs a conformer may depend on
#[derive(Debug, Clone, Copy)]
pub struct ConformContext {
    pub run_date: NaiveDate,
}

/// Kinds of field-level defects resolved during conformance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DefectKind {
    /// Business key null or unparseable; the row cannot be keyed and is dropped
    MissingKey,
    /// Present but unparseable value resolved to unknown
    MalformedValue,
    /// Code outside its mapping table, resolved to the default label
    UnmappedCode,
    /// Date after the run date, resolved to unknown
    FutureDate,
    /// Amount recomputed from quantity and price
    RepairedAmount,
    /// Price derived from amount and quantity
    DerivedPrice,
}

impl DefectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectKind::MissingKey => "missing_key",
            DefectKind::MalformedValue => "malformed_value",
            DefectKind::UnmappedCode => "unmapped_code",
            DefectKind::FutureDate => "future_date",
            DefectKind::RepairedAmount => "repaired_amount",
            DefectKind::DerivedPrice => "derived_price",
        }
    }
}

/// Tally of defects per (field, kind) for one relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defects {
    counts: BTreeMap<(String, DefectKind), usize>,
}

impl Defects {
    pub fn note(&mut self, field: &str, kind: DefectKind) {
        *self.counts.entry((field.to_string(), kind)).or_insert(0) += 1;
    }

    /// Unwrap a parsed value, noting it when malformed
    pub fn track<T>(&mut self, field: &str, parsed: Parsed<T>) -> Option<T> {
        if parsed.is_malformed() {
            self.note(field, DefectKind::MalformedValue);
        }
        parsed.value()
    }

    /// Unwrap a key; anything but a value is a missing key
    pub fn track_key<T>(&mut self, field: &str, parsed: Parsed<T>) -> Option<T> {
        let value = parsed.value();
        if value.is_none() {
            self.note(field, DefectKind::MissingKey);
        }
        value
    }

    /// Label for a mapped code, noting unrecognized codes
    pub fn track_code(&mut self, field: &str, mapped: rules::Mapped) -> String {
        if !mapped.recognized {
            self.note(field, DefectKind::UnmappedCode);
        }
        mapped.label.to_string()
    }

    pub fn count(&self, field: &str, kind: DefectKind) -> usize {
        self.counts
            .get(&(field.to_string(), kind))
            .copied()
            .unwrap_or(0)
    }

    pub fn count_kind(&self, kind: DefectKind) -> usize {
        self.counts
            .iter()
            .filter(|((_, k), _)| *k == kind)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DefectKind, usize)> {
        self.counts
            .iter()
            .map(|((field, kind), n)| (field.as_str(), *kind, *n))
    }
}

/// Conformed output for one relation, rows already in their stored form
#[derive(Debug, Clone)]
pub struct ConformOutput {
    pub rows: Vec<Row>,
    pub rows_in: usize,
    pub duplicates_dropped: usize,
    pub defects: Defects,
}

impl ConformOutput {
    pub fn from_records<T: Serialize>(
        relation: &str,
        rows_in: usize,
        records: Deduplicated<T>,
        defects: Defects,
    ) -> Result<Self> {
        let rows = records
            .records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::write(relation, e))?;
        Ok(Self {
            rows,
            rows_in,
            duplicates_dropped: records.duplicates_dropped,
            defects,
        })
    }
}

/// Source-specific conformance for one relation
pub trait Conformer: Send + Sync {
    /// The raw entity this conformer reads, and the conformed relation it writes
    fn relation(&self) -> &'static str;

    /// Deduplicate, cleanse and derive. Field defects are tallied, never raised.
    fn conform(&self, records: Vec<RawRecord>, ctx: &ConformContext) -> Result<ConformOutput>;
}

/// Runs every registered conformer and replaces the conformed store relations
pub struct ConformanceEngine {
    registry: ConformerRegistry,
}

impl Default for ConformanceEngine {
    fn default() -> Self {
        Self::new(ConformerRegistry::new())
    }
}

impl ConformanceEngine {
    pub fn new(registry: ConformerRegistry) -> Self {
        Self { registry }
    }

    /// Conform every relation. Relations are independent and run as parallel
    /// tasks; each one's replace is all-or-nothing. The first structural
    /// failure is returned after every task has finished and been recorded.
    pub async fn run(
        &self,
        raw: Arc<dyn RawStagingStore>,
        conformed: Arc<dyn RelationStore>,
        ctx: &mut RunContext,
    ) -> Result<()> {
        info!("🔧 Conformance starting for {} relations", self.registry.len());
        let conform_ctx = ConformContext {
            run_date: ctx.run_date,
        };

        // Registry order; a task that panics fails only its own relation
        let tasks: Vec<_> = self
            .registry
            .conformers()
            .into_iter()
            .map(|conformer| {
                let raw = raw.clone();
                let conformed = conformed.clone();
                let relation = conformer.relation();
                let started = Instant::now();
                let handle = tokio::spawn(async move {
                    conform_relation(conformer.as_ref(), raw.as_ref(), conformed.as_ref(), &conform_ctx).await
                });
                (relation, started, handle)
            })
            .collect();

        let mut first_error = None;
        for (relation, started, handle) in tasks {
            let result = handle.await.map_err(PipelineError::from).and_then(|r| r);
            let elapsed = started.elapsed();
            metrics::conform::duration(relation, elapsed);
            match result {
                Ok(outcome) => ctx.record(StepOutcome { duration: elapsed, ..outcome }),
                Err(e) => {
                    error!("❌ Conformance failed for {}: {}", relation, e);
                    ctx.record(StepOutcome::failure(Stage::Conform, relation, elapsed, e.to_string()));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("✅ Conformance completed");
                Ok(())
            }
        }
    }
}

/// Read, conform and replace a single relation
pub async fn conform_relation(
    conformer: &dyn Conformer,
    raw: &dyn RawStagingStore,
    conformed: &dyn RelationStore,
    ctx: &ConformContext,
) -> Result<StepOutcome> {
    let relation = conformer.relation();
    let records = raw.read(relation).await?;
    debug!("Read {} raw rows for {}", records.len(), relation);

    let output = conformer.conform(records, ctx)?;
    let committed = conformed.replace(relation, output.rows).await?;

    metrics::conform::rows_processed(relation, output.rows_in, committed.row_count);
    metrics::conform::duplicates_dropped(relation, output.duplicates_dropped);
    for (field, kind, count) in output.defects.iter() {
        warn!("{}.{}: {} {} defect(s) resolved", relation, field, count, kind.as_str());
        metrics::conform::defects_resolved(relation, kind.as_str(), count);
    }

    let message = format!(
        "{} duplicates dropped, {} field defects resolved",
        output.duplicates_dropped,
        output.defects.total()
    );
    Ok(StepOutcome::success(
        Stage::Conform,
        relation,
        output.rows_in,
        committed.row_count,
        std::time::Duration::ZERO,
        message,
    )
    .with_defects(output.defects.total())
    .with_fingerprint(committed.fingerprint))
}
