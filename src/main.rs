use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use sales_warehouse::config::Config;
use sales_warehouse::observability::init_logging;
use sales_warehouse::pipeline::{BatchRunner, RunSummary, Stage};
use sales_warehouse::storage::{FileRawStagingStore, FileRelationStore};

#[derive(Parser)]
#[command(name = "sales-warehouse")]
#[command(about = "Conform CRM/ERP extracts into a sales star schema and reconcile it")]
#[command(version = "0.1.0")]
struct Cli {
    /// Override the configured run date (YYYY-MM-DD)
    #[arg(long, global = true)]
    run_date: Option<NaiveDate>,

    /// Print the run summary as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Conform, model and reconcile in one run
    Run,
    /// Rebuild the conformed store from raw staging
    Conform,
    /// Rebuild the published model from the conformed store
    Model,
    /// Check the published model without changing it
    Reconcile,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    // Logging comes up before config errors are reported
    let config = Config::load();
    let log_dir = config
        .as_ref()
        .ok()
        .and_then(|c| c.run.log_dir.clone())
        .unwrap_or_else(|| "logs".to_string());
    let _guard = init_logging(&log_dir);
    let config = config.inspect_err(|e| error!("Invalid configuration: {}", e))?;

    let raw = Arc::new(FileRawStagingStore::new(&config.stores.raw_dir));
    let conformed = Arc::new(FileRelationStore::new("conformed", &config.stores.conformed_dir)?);
    let published = Arc::new(FileRelationStore::new("published", &config.stores.published_dir)?);
    let runner = BatchRunner::from_config(&config, raw, conformed, published);

    let run_date = cli.run_date.or(config.run.run_date);
    let summary = match cli.command {
        Commands::Run => runner.run(run_date).await?,
        Commands::Conform => runner.run_stage(Stage::Conform, run_date).await?,
        Commands::Model => runner.run_stage(Stage::Model, run_date).await?,
        Commands::Reconcile => runner.run_stage(Stage::Reconcile, run_date).await?,
    };

    print_summary(&summary, cli.json)?;

    let status = summary.exit_status(config.reconcile.fail_on_findings);
    match (status, summary.failed_stage) {
        (0, _) => info!("Done"),
        (_, Some(stage)) => error!("Run failed at stage {}", stage),
        _ => error!("Reconciliation reported error-severity findings"),
    }
    Ok(ExitCode::from(status))
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{}", summary.context.summary());
    if let Some(report) = &summary.report {
        println!("\n📊 Reconciliation:");
        for (kind, count) in report.counts() {
            println!("   {}: {}", kind, count);
        }
        println!("{}", serde_json::to_string_pretty(&report.findings)?);
    }
    Ok(())
}
