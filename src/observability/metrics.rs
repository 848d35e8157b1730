//! Stage metrics for the warehouse pipeline
//!
//! Thin wrappers over the `metrics` facade using Prometheus naming
//! conventions. Without an installed recorder every call is a no-op.

use std::fmt;
use std::time::Duration;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Conformance metrics
    ConformRowsIn,
    ConformRowsOut,
    ConformDuplicatesDropped,
    ConformDefects,
    ConformDuration,

    // Modeling metrics
    ModelRowsPublished,
    ModelUnresolvedKeys,
    ModelDuration,

    // Reconciliation metrics
    ReconcileFindings,
    ReconcileDuration,

    // Run metrics
    RunStagesFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ConformRowsIn => "warehouse_conform_rows_in_total",
            MetricName::ConformRowsOut => "warehouse_conform_rows_out_total",
            MetricName::ConformDuplicatesDropped => "warehouse_conform_duplicates_dropped_total",
            MetricName::ConformDefects => "warehouse_conform_field_defects_total",
            MetricName::ConformDuration => "warehouse_conform_duration_seconds",

            MetricName::ModelRowsPublished => "warehouse_model_rows_published_total",
            MetricName::ModelUnresolvedKeys => "warehouse_model_unresolved_keys_total",
            MetricName::ModelDuration => "warehouse_model_duration_seconds",

            MetricName::ReconcileFindings => "warehouse_reconcile_findings_total",
            MetricName::ReconcileDuration => "warehouse_reconcile_duration_seconds",

            MetricName::RunStagesFailed => "warehouse_run_stages_failed_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod conform {
    use super::*;

    /// Record rows read and written for one relation
    pub fn rows_processed(relation: &str, rows_in: usize, rows_out: usize) {
        ::metrics::counter!(MetricName::ConformRowsIn.as_str(), "relation" => relation.to_string())
            .increment(rows_in as u64);
        ::metrics::counter!(MetricName::ConformRowsOut.as_str(), "relation" => relation.to_string())
            .increment(rows_out as u64);
    }

    pub fn duplicates_dropped(relation: &str, count: usize) {
        ::metrics::counter!(
            MetricName::ConformDuplicatesDropped.as_str(),
            "relation" => relation.to_string()
        )
        .increment(count as u64);
    }

    /// Record field-level defects resolved to a sentinel
    pub fn defects_resolved(relation: &str, kind: &str, count: usize) {
        ::metrics::counter!(
            MetricName::ConformDefects.as_str(),
            "relation" => relation.to_string(),
            "kind" => kind.to_string()
        )
        .increment(count as u64);
    }

    pub fn duration(relation: &str, elapsed: Duration) {
        ::metrics::histogram!(MetricName::ConformDuration.as_str(), "relation" => relation.to_string())
            .record(elapsed.as_secs_f64());
    }
}

pub mod model {
    use super::*;

    pub fn rows_published(relation: &str, rows: usize) {
        ::metrics::counter!(MetricName::ModelRowsPublished.as_str(), "relation" => relation.to_string())
            .increment(rows as u64);
    }

    /// Record fact rows whose foreign key could not be resolved
    pub fn unresolved_keys(dimension: &str, count: usize) {
        ::metrics::counter!(
            MetricName::ModelUnresolvedKeys.as_str(),
            "dimension" => dimension.to_string()
        )
        .increment(count as u64);
    }

    pub fn duration(relation: &str, elapsed: Duration) {
        ::metrics::histogram!(MetricName::ModelDuration.as_str(), "relation" => relation.to_string())
            .record(elapsed.as_secs_f64());
    }
}

pub mod reconcile {
    use super::*;

    pub fn finding_reported(kind: &str, severity: &str) {
        ::metrics::counter!(
            MetricName::ReconcileFindings.as_str(),
            "kind" => kind.to_string(),
            "severity" => severity.to_string()
        )
        .increment(1);
    }

    pub fn duration(elapsed: Duration) {
        ::metrics::histogram!(MetricName::ReconcileDuration.as_str()).record(elapsed.as_secs_f64());
    }
}

pub mod run {
    use super::*;

    pub fn stage_failed(stage: &str) {
        ::metrics::counter!(MetricName::RunStagesFailed.as_str(), "stage" => stage.to_string())
            .increment(1);
    }
}
