//! Batchline - chunked batch import tool

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use batchline_cli::config::AppConfig;
use batchline_cli::person::{self, Person};
use batchline_common::logging::{init_logging, LogConfig, LogLevel};
use batchline_core::{
    execution::JobStatus,
    orchestrator::RunRegistry,
    reader::{FlatFileReader, RecordReader},
    scheduler::FixedRateSchedule,
    writer::PgChunkWriter,
};

#[derive(Parser, Debug)]
#[command(name = "batchline")]
#[command(author, version, about = "Chunked batch import: delimited files into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file
    #[arg(short, long, default_value = "batchline.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute the import job once
    Run,

    /// Execute the import job on a fixed-rate schedule until interrupted
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let config = AppConfig::load(&cli.config)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&config.database.url)
        .await?;
    info!("Database connection pool established");

    sqlx::migrate!("../../migrations").run(&pool).await?;

    let writer = PgChunkWriter::<Person>::new(pool, &config.job.target)?;
    let registry = Arc::new(RunRegistry::new());
    let job = person::build_job(&config.job, Box::new(writer), registry)?;

    match cli.command {
        Command::Run => {
            let mut reader = FlatFileReader::open(&config.job.input)?;
            let execution = job.run(&mut reader).await?;

            if execution.status == JobStatus::Failed {
                error!(
                    cause = execution.exit_message.as_deref().unwrap_or("unknown"),
                    "Import failed"
                );
                std::process::exit(1);
            }
        },
        Command::Schedule => {
            let period = Duration::from_secs(config.schedule.period_secs);
            let input = config.job.input.clone();

            let handle = FixedRateSchedule::new(period).start(Arc::new(job), move || {
                let reader = FlatFileReader::open(&input)?;
                Ok(Box::new(reader) as Box<dyn RecordReader>)
            });

            tokio::signal::ctrl_c().await?;
            handle.abort();
            info!("Schedule stopped");
        },
    }

    Ok(())
}
