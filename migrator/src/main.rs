//! Main entry point for the migrator binary

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tokio::signal;

use migrator::services::{
    EnvCredentialSource, JsonlLedger, LocalJobRunner, MigrationJobHandler, TokioSleeper, summarize,
};
use migrator::{CredentialSource, JobRunner, MigrationConfig, MigrationJob, PageFailurePolicy, RunnerConfig, Sleeper};
use shared::logging;

/// Migrates orders from one store to another
#[derive(Parser)]
#[command(name = "migrator")]
#[command(about = "Copies orders between stores, remapping variants by SKU")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one migration from the source store to the destination store
    Run(RunArgs),
    /// Summarize an outcome ledger
    Report {
        /// Ledger file to read
        #[arg(long, default_value = "outcomes.jsonl")]
        ledger: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Ledger file outcomes are appended to
    #[arg(long, default_value = "outcomes.jsonl")]
    ledger: PathBuf,

    /// Records requested per page (1-250)
    #[arg(long, default_value = "250")]
    page_size: u32,

    /// Orders submitted between batch pauses
    #[arg(long, default_value = "3")]
    batch_size: usize,

    /// Pause after each submitted order, in milliseconds
    #[arg(long, default_value = "1000")]
    item_delay_ms: u64,

    /// Pause after each batch, in seconds
    #[arg(long, default_value = "60")]
    batch_delay_secs: u64,

    /// Wait after a rate-limited order when no Retry-After is given, in seconds
    #[arg(long, default_value = "60")]
    default_retry_after_secs: u64,

    /// Order status filter for the source walk
    #[arg(long, default_value = "any")]
    status: String,

    /// What to do when an order page cannot be fetched (truncate, propagate)
    #[arg(long, default_value = "truncate")]
    on_page_failure: PageFailurePolicy,

    /// Attempts for the whole run, including the first
    #[arg(long, default_value = "3")]
    attempts: u32,

    /// Pause between run attempts, in seconds
    #[arg(long, default_value = "30")]
    attempt_delay_secs: u64,
}

impl RunArgs {
    fn migration_config(&self) -> MigrationConfig {
        MigrationConfig {
            page_size: self.page_size,
            batch_size: self.batch_size,
            item_delay: Duration::from_millis(self.item_delay_ms),
            batch_delay: Duration::from_secs(self.batch_delay_secs),
            default_retry_after: Duration::from_secs(self.default_retry_after_secs),
            order_status: self.status.clone(),
            order_page_failure: self.on_page_failure,
            ..MigrationConfig::default()
        }
    }

    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            concurrency: 1,
            max_attempts: self.attempts,
            retry_delay: Duration::from_secs(self.attempt_delay_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(Some(&cli.log_level));

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Report { ledger } => report(ledger).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.migration_config();
    config.validate().context("invalid run settings")?;

    let stores = EnvCredentialSource::new().load().context("loading store credentials")?;
    let job = MigrationJob::from_pair(stores);
    let job_id = job.job_id;

    logging::log_startup(&job_id, &format!("migration job, ledger {}", args.ledger.display()));

    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let ledger = Arc::new(JsonlLedger::new(args.ledger.clone()));
    let handler = MigrationJobHandler::new(ledger, config, sleeper.clone());
    let runner = LocalJobRunner::new(handler, args.runner_config(), sleeper);

    runner.submit(job).await?;

    tokio::select! {
        report = runner.join(job_id) => {
            let report = report?;
            match report.result {
                Ok(summary) => {
                    logging::log_success(
                        &job_id,
                        &format!(
                            "Run {} finished: {} migrated, {} failed, {} unmapped",
                            summary.run_id, summary.succeeded, summary.failed, summary.unmapped
                        ),
                    );
                    Ok(())
                }
                Err(message) => {
                    logging::log_error(&job_id, "Migration job", &message);
                    bail!("migration failed after {} attempt(s): {}", report.attempts, message)
                }
            }
        }
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => logging::log_shutdown(&job_id, "Received Ctrl+C signal"),
                Err(err) => logging::log_error(&job_id, "Signal handling", &err),
            }
            Ok(())
        }
    }
}

async fn report(path: PathBuf) -> anyhow::Result<()> {
    let records = JsonlLedger::new(path.clone())
        .read_all()
        .await
        .with_context(|| format!("reading ledger {}", path.display()))?;
    let summary = summarize(&records);

    logging::log_progress(
        &path.display(),
        "Ledger",
        &format!("{} records, {} succeeded, {} failed", summary.total, summary.succeeded, summary.failed),
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
