//! Reconciliation engine: read-only integrity checks over the published model.

pub mod checks;
pub mod findings;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::common::constants::{CRM_CUSTOMERS, CRM_SALES, DIM_CUSTOMERS, DIM_PRODUCTS, FACT_SALES};
use crate::common::error::{PipelineError, Result};
use crate::domain::{CustomerDim, ProductDim, SalesFact};
use crate::observability::metrics;
use crate::pipeline::processing::conform::rules::{
    CodeMap, COUNTRY, CRM_GENDER, MAINTENANCE, MARITAL_STATUS, PRODUCT_LINE,
};
use crate::pipeline::run::{RunContext, Stage, StepOutcome};
use crate::storage::{read_records, RelationStore};

pub use findings::{Finding, Severity};

/// Entity name used for the single outcome this engine records
pub const RECONCILIATION: &str = "reconciliation";

/// Findings of one reconciliation pass. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub findings: Vec<Finding>,
}

impl ReconciliationReport {
    pub fn new(run_id: Uuid, findings: Vec<Finding>) -> Self {
        Self { run_id, findings }
    }

    /// Finding counts keyed by kind
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.kind()).or_default() += 1;
        }
        counts
    }

    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() >= severity)
            .count()
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.kind() == kind)
    }

    /// True when nothing beyond informational profiling was found
    pub fn is_clean(&self) -> bool {
        self.count_at_least(Severity::Warning) == 0
    }

    pub fn has_errors(&self) -> bool {
        self.count_at_least(Severity::Error) > 0
    }
}

/// Collect every finding for an already-loaded model
pub fn reconcile(
    customers: &[CustomerDim],
    products: &[ProductDim],
    facts: &[SalesFact],
    source_sales: usize,
    source_customers: usize,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    findings.extend(checks::orphan_facts(facts, customers, products));
    findings.extend(checks::count_parity(FACT_SALES, CRM_SALES, source_sales, facts.len()));
    findings.extend(checks::count_parity(
        DIM_CUSTOMERS,
        CRM_CUSTOMERS,
        source_customers,
        customers.len(),
    ));
    findings.extend(checks::duplicate_keys(
        DIM_CUSTOMERS,
        customers.iter().map(|c| c.customer_key),
    ));
    findings.extend(checks::duplicate_keys(
        DIM_PRODUCTS,
        products.iter().map(|p| p.product_key),
    ));
    findings.extend(checks::date_order(facts));
    findings.extend(checks::measure_consistency(facts));

    let customer_columns: [(&str, fn(&CustomerDim) -> &str, &CodeMap); 3] = [
        ("gender", |c| c.gender.as_str(), &*CRM_GENDER),
        ("marital_status", |c| c.marital_status.as_str(), &*MARITAL_STATUS),
        ("country", |c| c.country.as_str(), &*COUNTRY),
    ];
    for (attribute, column, table) in customer_columns {
        let values = || customers.iter().map(column);
        findings.push(checks::distinct_values(DIM_CUSTOMERS, attribute, values()));
        findings.extend(checks::unexpected_categories(DIM_CUSTOMERS, attribute, values(), table));
    }

    let product_columns: [(&str, fn(&ProductDim) -> &str, Option<&CodeMap>); 3] = [
        ("product_line", |p| p.product_line.as_str(), Some(&*PRODUCT_LINE)),
        ("category", |p| p.category.as_str(), None),
        ("maintenance", |p| p.maintenance.as_str(), Some(&*MAINTENANCE)),
    ];
    for (attribute, column, table) in product_columns {
        let values = || products.iter().map(column);
        findings.push(checks::distinct_values(DIM_PRODUCTS, attribute, values()));
        if let Some(table) = table {
            findings.extend(checks::unexpected_categories(DIM_PRODUCTS, attribute, values(), table));
        }
    }

    findings
}

#[derive(Debug, Default)]
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Reads the published model and the conformed sources it came from.
    /// Never writes to either store.
    pub async fn run(
        &self,
        conformed: Arc<dyn RelationStore>,
        published: Arc<dyn RelationStore>,
        ctx: &mut RunContext,
    ) -> Result<ReconciliationReport> {
        info!("🔍 Reconciliation starting");
        let started = Instant::now();

        let loaded = async {
            let customers: Vec<CustomerDim> = read_records(published.as_ref(), DIM_CUSTOMERS).await?;
            let products: Vec<ProductDim> = read_records(published.as_ref(), DIM_PRODUCTS).await?;
            let facts: Vec<SalesFact> = read_records(published.as_ref(), FACT_SALES).await?;
            let source_sales = conformed.read(CRM_SALES).await?.len();
            let source_customers = conformed.read(CRM_CUSTOMERS).await?.len();
            Ok::<_, PipelineError>((
                customers,
                products,
                facts,
                source_sales,
                source_customers,
            ))
        }
        .await;

        let (customers, products, facts, source_sales, source_customers) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("❌ Reconciliation could not load its inputs: {}", e);
                ctx.record(StepOutcome::failure(
                    Stage::Reconcile,
                    RECONCILIATION,
                    started.elapsed(),
                    e.to_string(),
                ));
                return Err(e);
            }
        };

        let findings = reconcile(&customers, &products, &facts, source_sales, source_customers);
        let report = ReconciliationReport::new(ctx.run_id, findings);

        for finding in &report.findings {
            metrics::reconcile::finding_reported(finding.kind(), finding.severity().as_str());
            match finding.severity() {
                Severity::Info => debug!("{}", finding),
                Severity::Warning | Severity::Error => warn!("[{}] {}", finding.severity(), finding),
            }
        }

        let elapsed = started.elapsed();
        metrics::reconcile::duration(elapsed);

        let rows_in = customers.len() + products.len() + facts.len();
        let issues = report.count_at_least(Severity::Warning);
        let message = if report.is_clean() {
            "no integrity findings".to_string()
        } else {
            let counts: Vec<String> = report
                .counts()
                .into_iter()
                .filter(|(kind, _)| *kind != "distinct_values")
                .map(|(kind, n)| format!("{}={}", kind, n))
                .collect();
            counts.join(", ")
        };
        ctx.record(
            StepOutcome::success(
                Stage::Reconcile,
                RECONCILIATION,
                rows_in,
                report.findings.len(),
                elapsed,
                message,
            )
            .with_defects(issues),
        );

        info!(
            "✅ Reconciliation completed: {} findings ({} needing attention)",
            report.findings.len(),
            issues
        );
        Ok(report)
    }
}
