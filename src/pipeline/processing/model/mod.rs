//! Modeling engine: conformed relations to the published dimensional model.

pub mod customers;
pub mod keys;
pub mod products;
pub mod sales;

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::common::constants::{
    CRM_CUSTOMERS, CRM_PRODUCTS, CRM_SALES, DIM_CUSTOMERS, DIM_PRODUCTS, ERP_CATEGORIES,
    ERP_CUSTOMERS, ERP_LOCATIONS, FACT_SALES,
};
use crate::common::error::{PipelineError, Result};
use crate::domain::{
    CrmCustomer, CrmProduct, CrmSale, CustomerDim, ErpCategory, ErpCustomer, ErpLocation,
    ProductDim,
};
use crate::observability::metrics;
use crate::pipeline::run::{RunContext, Stage, StepOutcome};
use crate::storage::{read_records, replace_records, RelationStore};

pub use customers::build_customer_dimension;
pub use keys::CustomerKeyNormalizer;
pub use products::build_product_dimension;
pub use sales::{build_sales_fact, FactBuild};

/// Builds `dim_customers`, `dim_products` and `fact_sales`, in that order,
/// each from the conformed store's committed contents.
pub struct ModelingEngine {
    keys: CustomerKeyNormalizer,
}

impl Default for ModelingEngine {
    fn default() -> Self {
        Self::new(CustomerKeyNormalizer::default())
    }
}

impl ModelingEngine {
    pub fn new(keys: CustomerKeyNormalizer) -> Self {
        Self { keys }
    }

    pub async fn run(
        &self,
        conformed: Arc<dyn RelationStore>,
        published: Arc<dyn RelationStore>,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let (conformed, published) = (conformed.as_ref(), published.as_ref());
        info!("🔗 Modeling starting (run date {})", ctx.run_date);

        let started = Instant::now();
        let customers = match publish_customers(conformed, published, &self.keys).await {
            Ok((customers, outcome)) => {
                record(ctx, outcome, started);
                customers
            }
            Err(e) => return fail(ctx, DIM_CUSTOMERS, started, e),
        };

        let started = Instant::now();
        let run_date = ctx.run_date;
        let products = match publish_products(conformed, published, run_date).await {
            Ok((products, outcome)) => {
                record(ctx, outcome, started);
                products
            }
            Err(e) => return fail(ctx, DIM_PRODUCTS, started, e),
        };

        let started = Instant::now();
        match publish_sales(conformed, published, &customers, &products).await {
            Ok(outcome) => record(ctx, outcome, started),
            Err(e) => return fail(ctx, FACT_SALES, started, e),
        }

        info!("✅ Modeling completed");
        Ok(())
    }
}

async fn publish_customers(
    conformed: &dyn RelationStore,
    published: &dyn RelationStore,
    keys: &CustomerKeyNormalizer,
) -> Result<(Vec<CustomerDim>, StepOutcome)> {
    let crm: Vec<CrmCustomer> = read_records(conformed, CRM_CUSTOMERS).await?;
    let erp: Vec<ErpCustomer> = read_records(conformed, ERP_CUSTOMERS).await?;
    let locations: Vec<ErpLocation> = read_records(conformed, ERP_LOCATIONS).await?;

    let dims = build_customer_dimension(&crm, &erp, &locations, keys);
    let committed = replace_records(published, DIM_CUSTOMERS, &dims).await?;
    let message = format!(
        "merged {} CRM customers with {} ERP demographics and {} locations",
        crm.len(),
        erp.len(),
        locations.len()
    );
    Ok((
        dims,
        StepOutcome::success(Stage::Model, DIM_CUSTOMERS, crm.len(), committed.row_count, Duration::ZERO, message)
            .with_fingerprint(committed.fingerprint),
    ))
}

async fn publish_products(
    conformed: &dyn RelationStore,
    published: &dyn RelationStore,
    run_date: NaiveDate,
) -> Result<(Vec<ProductDim>, StepOutcome)> {
    let products: Vec<CrmProduct> = read_records(conformed, CRM_PRODUCTS).await?;
    let categories: Vec<ErpCategory> = read_records(conformed, ERP_CATEGORIES).await?;

    let dims = build_product_dimension(&products, &categories, run_date);
    let committed = replace_records(published, DIM_PRODUCTS, &dims).await?;
    let message = format!(
        "{} current of {} product versions",
        dims.len(),
        products.len()
    );
    Ok((
        dims,
        StepOutcome::success(Stage::Model, DIM_PRODUCTS, products.len(), committed.row_count, Duration::ZERO, message)
            .with_fingerprint(committed.fingerprint),
    ))
}

async fn publish_sales(
    conformed: &dyn RelationStore,
    published: &dyn RelationStore,
    customers: &[CustomerDim],
    products: &[ProductDim],
) -> Result<StepOutcome> {
    let sales: Vec<CrmSale> = read_records(conformed, CRM_SALES).await?;

    let build = build_sales_fact(&sales, customers, products);
    if build.unresolved_customers > 0 || build.unresolved_products > 0 {
        warn!(
            "{} sales without a customer key, {} without a product key",
            build.unresolved_customers, build.unresolved_products
        );
    }
    metrics::model::unresolved_keys(DIM_CUSTOMERS, build.unresolved_customers);
    metrics::model::unresolved_keys(DIM_PRODUCTS, build.unresolved_products);

    let committed = replace_records(published, FACT_SALES, &build.facts).await?;
    let message = format!(
        "{} unresolved customer keys, {} unresolved product keys",
        build.unresolved_customers, build.unresolved_products
    );
    Ok(
        StepOutcome::success(Stage::Model, FACT_SALES, sales.len(), committed.row_count, Duration::ZERO, message)
            .with_defects(build.unresolved_customers + build.unresolved_products)
            .with_fingerprint(committed.fingerprint),
    )
}

fn record(ctx: &mut RunContext, outcome: StepOutcome, started: Instant) {
    let elapsed = started.elapsed();
    metrics::model::rows_published(&outcome.entity, outcome.rows_out);
    metrics::model::duration(&outcome.entity, elapsed);
    ctx.record(StepOutcome {
        duration: elapsed,
        ..outcome
    });
}

fn fail(ctx: &mut RunContext, relation: &str, started: Instant, e: PipelineError) -> Result<()> {
    error!("❌ Modeling failed for {}: {}", relation, e);
    ctx.record(StepOutcome::failure(Stage::Model, relation, started.elapsed(), e.to_string()));
    Err(e)
}
