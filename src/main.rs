use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::{net::TcpListener, runtime::Handle};

use customer_batch::{
    core::{job::JobParametersBuilder, launcher::JobLauncher},
    customer::{create_schema, CustomerImportJob},
    server::{self, AppState},
    settings::{Settings, DEFAULT_CONFIG_FILE},
};

#[derive(Parser)]
#[command(name = "customer-batch", version, about = "Imports customers from a CSV file into SQLite")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP trigger (default)
    Serve,
    /// Run one import and exit
    Run {
        /// Log surviving customers instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::load_from(&cli.config).context("cannot load settings")?;

    let pool = SqlitePoolOptions::new()
        .connect(&settings.database_url)
        .await
        .with_context(|| format!("cannot connect to {}", settings.database_url))?;
    create_schema(&pool).await?;

    let launcher = Arc::new(JobLauncher::new());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let bind_address = settings.bind_address.clone();
            let job = Arc::new(CustomerImportJob::new(settings, pool, Handle::current()));
            let listener = TcpListener::bind(&bind_address)
                .await
                .with_context(|| format!("cannot bind {}", bind_address))?;

            server::serve(listener, AppState::new(launcher, job)).await?;
        }
        Command::Run { dry_run } => {
            let job = CustomerImportJob::new(settings, pool, Handle::current()).dry_run(dry_run);
            let parameters = JobParametersBuilder::new()
                .add_long("startAt", Utc::now().timestamp_millis())
                .to_job_parameters();

            let execution =
                tokio::task::spawn_blocking(move || launcher.run(&job, parameters)).await??;

            for step in &execution.step_executions {
                info!(
                    "{}: read {}, filtered {}, written {} in {:?}",
                    step.name, step.read_count, step.filter_count, step.write_count, step.duration
                );
            }
        }
    }

    Ok(())
}
