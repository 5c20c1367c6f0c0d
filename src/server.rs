use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Router};
use chrono::Utc;
use log::{error, info};
use tokio::net::TcpListener;

use crate::{
    core::{
        job::{Job, JobParametersBuilder},
        launcher::JobLauncher,
    },
    BatchError,
};

/// Path of the import trigger.
pub const IMPORT_CUSTOMERS_PATH: &str = "/jobs/importCustomers";

/// Shared state of the HTTP trigger.
#[derive(Clone)]
pub struct AppState {
    launcher: Arc<JobLauncher>,
    job: Arc<dyn Job + Send + Sync>,
}

impl AppState {
    pub fn new(launcher: Arc<JobLauncher>, job: Arc<dyn Job + Send + Sync>) -> Self {
        Self { launcher, job }
    }
}

/// Builds the router exposing `POST /jobs/importCustomers`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(IMPORT_CUSTOMERS_PATH, post(import_customers))
        .with_state(state)
}

/// Serves the router on `listener` until the server stops.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), BatchError> {
    info!(
        "Listening on {}",
        listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown address".to_string())
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Starts one run of the job, distinguished by its start timestamp.
///
/// The response is always `200 OK` with an empty body: the outcome of the
/// run, including a refused duplicate launch, is only logged.
async fn import_customers(State(state): State<AppState>) -> StatusCode {
    let parameters = JobParametersBuilder::new()
        .add_long("startAt", Utc::now().timestamp_millis())
        .to_job_parameters();
    let job_name = state.job.get_name().to_string();

    let outcome = tokio::task::spawn_blocking(move || {
        state.launcher.run(state.job.as_ref(), parameters)
    })
    .await;

    match outcome {
        Ok(Ok(execution)) => info!(
            "Job {} ({}) completed in {:?}",
            execution.name, execution.id, execution.duration
        ),
        Ok(Err(err)) => error!("Job {} could not complete: {}", job_name, err),
        Err(err) => error!("Job task aborted: {}", err),
    }

    StatusCode::OK
}
