#![allow(dead_code)]

pub mod mocks;

use std::{io::Write, path::Path, sync::Arc};

use customer_batch::{
    core::{
        job::{JobExecution, JobParameters, JobParametersBuilder, JobResult},
        launcher::JobLauncher,
    },
    customer::{create_schema, CustomerImportJob},
    settings::Settings,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tempfile::NamedTempFile;

pub const HEADER: &str = "id,firstName,lastName,email,gender,contactNo,country,dob";

/// Writes `lines` to a temporary CSV file, one per line.
pub fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".csv").unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

pub fn settings_for(input: &Path) -> Settings {
    Settings {
        input_path: input.to_path_buf(),
        database_url: "sqlite::memory:".to_string(),
        target_country: "United States".to_string(),
        chunk_size: 10,
        concurrency_limit: 10,
        delimiter: ",".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
    }
}

/// In-memory database on a single connection, with the customers table.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();
    pool
}

pub fn start_at(millis: i64) -> JobParameters {
    JobParametersBuilder::new()
        .add_long("startAt", millis)
        .to_job_parameters()
}

/// Runs `job` through `launcher` off the async worker, as the trigger does.
pub async fn launch(
    launcher: &Arc<JobLauncher>,
    job: &Arc<CustomerImportJob>,
    parameters: JobParameters,
) -> JobResult<JobExecution> {
    let launcher = Arc::clone(launcher);
    let job = Arc::clone(job);
    tokio::task::spawn_blocking(move || launcher.run(job.as_ref(), parameters))
        .await
        .unwrap()
}

/// Ids and countries of the persisted customers, by id.
pub async fn persisted(pool: &SqlitePool) -> Vec<(i32, String)> {
    sqlx::query_as::<_, (i32, String)>("SELECT id, country FROM customers ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}
