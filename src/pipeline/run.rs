use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// The three engines, in the only order they may run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Stage {
    Conform,
    Model,
    Reconcile,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Conform => "conform",
            Stage::Model => "model",
            Stage::Reconcile => "reconcile",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failure,
    /// Not attempted because an earlier stage failed
    Skipped,
}

/// Structured outcome of one engine over one relation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub stage: Stage,
    pub entity: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub duration: Duration,
    pub status: StepStatus,
    pub message: String,
    /// Field-level defects resolved to sentinels while producing this relation
    pub defects: usize,
    /// Fingerprint of the committed relation version, when one was written
    pub fingerprint: Option<String>,
}

impl StepOutcome {
    pub fn success(stage: Stage, entity: &str, rows_in: usize, rows_out: usize, duration: Duration, message: String) -> Self {
        Self {
            stage,
            entity: entity.to_string(),
            rows_in,
            rows_out,
            duration,
            status: StepStatus::Success,
            message,
            defects: 0,
            fingerprint: None,
        }
    }

    pub fn failure(stage: Stage, entity: &str, duration: Duration, message: String) -> Self {
        Self {
            stage,
            entity: entity.to_string(),
            rows_in: 0,
            rows_out: 0,
            duration,
            status: StepStatus::Failure,
            message,
            defects: 0,
            fingerprint: None,
        }
    }

    pub fn skipped(stage: Stage, entity: &str, message: String) -> Self {
        Self {
            stage,
            entity: entity.to_string(),
            rows_in: 0,
            rows_out: 0,
            duration: Duration::ZERO,
            status: StepStatus::Skipped,
            message,
            defects: 0,
            fingerprint: None,
        }
    }

    pub fn with_defects(mut self, defects: usize) -> Self {
        self.defects = defects;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Per-run state handed to each engine in turn. Engines append their outcomes
/// here; nothing about a run lives in globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    /// The date validity filters and future-date checks compare against
    pub run_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<StepOutcome>,
}

impl RunContext {
    pub fn new(run_date: NaiveDate) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            run_date,
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    /// Context dated today (UTC) unless a run date is pinned
    pub fn for_date(run_date: Option<NaiveDate>) -> Self {
        Self::new(run_date.unwrap_or_else(|| Utc::now().date_naive()))
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn stage_outcomes(&self, stage: Stage) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(move |o| o.stage == stage)
    }

    /// True when a stage ran and every one of its outcomes succeeded
    pub fn stage_succeeded(&self, stage: Stage) -> bool {
        let mut outcomes = self.stage_outcomes(stage).peekable();
        outcomes.peek().is_some() && outcomes.all(|o| o.is_success())
    }

    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Failure)
            .collect()
    }

    pub fn succeeded(&self) -> bool {
        self.failures().is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.outcomes.iter().map(|o| o.duration).sum()
    }

    /// Plain-text table of outcomes for console output
    pub fn summary(&self) -> String {
        let mut out = format!("run {} (run date {})\n", self.run_id, self.run_date);
        out.push_str(&format!(
            "{:<10} {:<16} {:>8} {:>8} {:>8} {:>10}  {:<8} {}\n",
            "stage", "entity", "rows_in", "rows_out", "defects", "ms", "status", "message"
        ));
        for o in &self.outcomes {
            out.push_str(&format!(
                "{:<10} {:<16} {:>8} {:>8} {:>8} {:>10}  {:<8} {}\n",
                o.stage.as_str(),
                o.entity,
                o.rows_in,
                o.rows_out,
                o.defects,
                o.duration.as_millis(),
                format!("{:?}", o.status),
                o.message
            ));
        }
        out
    }
}
