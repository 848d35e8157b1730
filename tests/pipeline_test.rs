use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

use sales_warehouse::common::constants::{
    published_relations, source_relations, CRM_CUSTOMERS, CRM_SALES, DIM_CUSTOMERS, DIM_PRODUCTS,
    FACT_SALES,
};
use sales_warehouse::domain::{CrmCustomer, CrmSale, CustomerDim, ProductDim, RawRecord, SalesFact};
use sales_warehouse::pipeline::processing::reconcile::Finding;
use sales_warehouse::pipeline::{BatchRunner, Stage, StepStatus};
use sales_warehouse::storage::{
    read_records, replace_records, InMemoryRawStagingStore, InMemoryRelationStore, RelationStore,
};

fn extract(content: &str) -> Vec<RawRecord> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| RawRecord::from_value(i as u64 + 1, serde_json::from_str(line).unwrap()))
        .collect()
}

fn staged_raw() -> Arc<InMemoryRawStagingStore> {
    let raw = InMemoryRawStagingStore::new();
    let extracts = [
        ("crm_customers", include_str!("resources/raw/crm_customers.ndjson")),
        ("crm_products", include_str!("resources/raw/crm_products.ndjson")),
        ("crm_sales", include_str!("resources/raw/crm_sales.ndjson")),
        ("erp_customers", include_str!("resources/raw/erp_customers.ndjson")),
        ("erp_locations", include_str!("resources/raw/erp_locations.ndjson")),
        ("erp_categories", include_str!("resources/raw/erp_categories.ndjson")),
    ];
    for (entity, content) in extracts {
        raw.load(entity, extract(content)).unwrap();
    }
    Arc::new(raw)
}

fn run_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, 1, 1)
}

struct Stores {
    conformed: Arc<InMemoryRelationStore>,
    published: Arc<InMemoryRelationStore>,
    runner: BatchRunner,
}

fn stores() -> Stores {
    let conformed = Arc::new(InMemoryRelationStore::new("conformed"));
    let published = Arc::new(InMemoryRelationStore::new("published"));
    let runner = BatchRunner::new(staged_raw(), conformed.clone(), published.clone());
    Stores {
        conformed,
        published,
        runner,
    }
}

#[tokio::test]
async fn full_run_publishes_dimensional_model() -> anyhow::Result<()> {
    let Stores {
        conformed,
        published,
        runner,
    } = stores();

    let summary = runner.run(run_date()).await?;
    assert!(summary.succeeded(), "{}", summary.context.summary());
    assert_eq!(summary.context.stage_outcomes(Stage::Conform).count(), 6);
    assert_eq!(summary.context.stage_outcomes(Stage::Model).count(), 3);
    assert_eq!(summary.context.stage_outcomes(Stage::Reconcile).count(), 1);

    let customers: Vec<CustomerDim> = read_records(published.as_ref(), DIM_CUSTOMERS).await?;
    let summary_rows: Vec<(u64, i64, &str, &str, &str)> = customers
        .iter()
        .map(|c| {
            (
                c.customer_key,
                c.customer_id,
                c.gender.as_str(),
                c.country.as_str(),
                c.marital_status.as_str(),
            )
        })
        .collect();
    assert_eq!(
        summary_rows,
        vec![
            (1, 11000, "Male", "Australia", "Married"),
            (2, 11001, "Female", "Germany", "Single"),
            (3, 11002, "Female", "n/a", "n/a"),
        ]
    );
    assert_eq!(customers[0].first_name, "Jon");
    assert_eq!(customers[0].last_name, "Yang");
    assert_eq!(customers[0].birth_date, NaiveDate::from_ymd_opt(1971, 10, 6));
    assert_eq!(customers[2].birth_date, None);

    let products: Vec<ProductDim> = read_records(published.as_ref(), DIM_PRODUCTS).await?;
    let product_ids: Vec<(u64, i64)> = products.iter().map(|p| (p.product_key, p.product_id)).collect();
    assert_eq!(product_ids, vec![(1, 210), (2, 214)]);
    assert_eq!(products[0].category, "Components");
    assert_eq!(products[0].cost, Decimal::ZERO);
    assert_eq!(products[0].product_line, "Road");
    assert_eq!(products[1].maintenance, "Yes");
    assert_eq!(products[1].cost, Decimal::from(13));

    let facts: Vec<SalesFact> = read_records(published.as_ref(), FACT_SALES).await?;
    let keys: Vec<(&str, Option<u64>, Option<u64>)> = facts
        .iter()
        .map(|f| (f.order_number.as_str(), f.customer_key, f.product_key))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("SO43697", Some(1), Some(1)),
            ("SO43698", Some(2), Some(2)),
            ("SO43699", Some(3), Some(2)),
            ("SO43700", None, None),
        ]
    );

    let sales: Vec<CrmSale> = read_records(conformed.as_ref(), CRM_SALES).await?;
    assert_eq!(sales.len(), 4);
    Ok(())
}

#[tokio::test]
async fn conformance_dedups_and_repairs() -> anyhow::Result<()> {
    let Stores {
        conformed, runner, ..
    } = stores();

    let summary = runner.run_stage(Stage::Conform, run_date()).await?;
    assert!(summary.succeeded());

    let customers: Vec<CrmCustomer> = read_records(conformed.as_ref(), CRM_CUSTOMERS).await?;
    assert_eq!(customers.len(), 3);
    assert_eq!(customers[1].first_name, "Eugene");
    assert_eq!(customers[1].gender, "n/a");

    let outcome = summary
        .context
        .outcomes
        .iter()
        .find(|o| o.entity == CRM_CUSTOMERS)
        .unwrap();
    assert_eq!(outcome.rows_in, 5);
    assert_eq!(outcome.rows_out, 3);
    assert!(outcome.defects > 0);

    let sales: Vec<CrmSale> = read_records(conformed.as_ref(), CRM_SALES).await?;
    assert_eq!(sales[0].amount, Some(Decimal::from(3578)));

    let repaired = &sales[1];
    assert_eq!(repaired.order_date, None);
    assert_eq!(repaired.amount, Some(Decimal::from(30)));
    assert_eq!(repaired.price, Some(Decimal::from(10)));

    let zero_quantity = &sales[2];
    assert_eq!(zero_quantity.order_date, NaiveDate::from_ymd_opt(2010, 12, 29));
    assert_eq!(zero_quantity.price, None);
    Ok(())
}

#[tokio::test]
async fn overflowing_sale_measures_do_not_abort_conformance() -> anyhow::Result<()> {
    let raw = staged_raw();
    raw.load(
        CRM_SALES,
        extract(
            r#"{"sls_ord_num":"SO1","sls_prd_key":"P1","sls_sales":5,"sls_quantity":9000000000000000000,"sls_price":"100000000000"}"#,
        ),
    )?;
    let conformed = Arc::new(InMemoryRelationStore::new("conformed"));
    let published = Arc::new(InMemoryRelationStore::new("published"));
    let runner = BatchRunner::new(raw, conformed.clone(), published);

    let summary = runner.run_stage(Stage::Conform, run_date()).await?;
    assert!(summary.succeeded(), "{}", summary.context.summary());
    assert_eq!(summary.context.stage_outcomes(Stage::Conform).count(), 6);

    let sales: Vec<CrmSale> = read_records(conformed.as_ref(), CRM_SALES).await?;
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].amount, None);
    Ok(())
}

#[tokio::test]
async fn repeated_runs_are_idempotent() -> anyhow::Result<()> {
    let Stores {
        conformed,
        published,
        runner,
    } = stores();

    runner.run(run_date()).await?;
    let mut first = Vec::new();
    for relation in source_relations() {
        first.push(conformed.version(relation).await?.unwrap().fingerprint);
    }
    for relation in published_relations() {
        first.push(published.version(relation).await?.unwrap().fingerprint);
    }

    runner.run(run_date()).await?;
    let mut second = Vec::new();
    for relation in source_relations() {
        let version = conformed.version(relation).await?.unwrap();
        assert_eq!(version.version, 2);
        second.push(version.fingerprint);
    }
    for relation in published_relations() {
        second.push(published.version(relation).await?.unwrap().fingerprint);
    }

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn every_fact_resolves_or_is_reported_as_orphan() -> anyhow::Result<()> {
    let Stores {
        published, runner, ..
    } = stores();

    let summary = runner.run(run_date()).await?;
    let report = summary.report.expect("reconciliation ran");
    let facts: Vec<SalesFact> = read_records(published.as_ref(), FACT_SALES).await?;

    for fact in &facts {
        let resolved = fact.customer_key.is_some() && fact.product_key.is_some();
        let reported = report.findings.iter().any(|f| {
            matches!(f, Finding::OrphanFact { order_number, .. } if *order_number == fact.order_number)
        });
        assert!(resolved != reported, "fact {} resolved={} reported={}", fact.order_number, resolved, reported);
    }

    let orphan = report.of_kind("orphan_fact").next().unwrap();
    assert_eq!(
        orphan,
        &Finding::OrphanFact {
            order_number: "SO43700".to_string(),
            product_number: "BK-R93R-62".to_string(),
            customer_missing: true,
            product_missing: true,
        }
    );
    assert_eq!(report.of_kind("count_mismatch").count(), 0);
    assert!(report.has_errors());
    Ok(())
}

#[tokio::test]
async fn reconcile_reports_count_mismatch_after_fact_loss() -> anyhow::Result<()> {
    let Stores {
        published, runner, ..
    } = stores();

    runner.run(run_date()).await?;
    let mut facts: Vec<SalesFact> = read_records(published.as_ref(), FACT_SALES).await?;
    facts.truncate(2);
    replace_records(published.as_ref(), FACT_SALES, &facts).await?;

    let summary = runner.run_stage(Stage::Reconcile, run_date()).await?;
    let report = summary.report.unwrap();
    let mismatch = report.of_kind("count_mismatch").next().unwrap();
    assert_eq!(
        mismatch,
        &Finding::CountMismatch {
            relation: FACT_SALES.to_string(),
            source_relation: CRM_SALES.to_string(),
            expected: 4,
            actual: 2,
            difference: 2,
        }
    );
    assert_eq!(summary.context.outcomes[0].status, StepStatus::Success);
    Ok(())
}
