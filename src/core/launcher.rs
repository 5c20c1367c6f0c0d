use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::{error, info, warn};

use crate::BatchError;

use super::job::{BatchStatus, Job, JobExecution, JobParameters, JobResult};

/// Identity of a run: the job name and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RunKey {
    job_name: String,
    parameters: JobParameters,
}

/// Launches jobs and guards against concurrent duplicate runs.
///
/// A run is identified by its job name and parameters. While a run is active,
/// launching the same job with equal parameters fails with
/// [`BatchError::JobExecutionAlreadyRunning`]. Runs with distinct parameters
/// are independent and may overlap.
///
/// # Example
///
/// ```
/// use customer_batch::core::job::{JobBuilder, JobParametersBuilder};
/// use customer_batch::core::launcher::JobLauncher;
///
/// let launcher = JobLauncher::new();
/// let job = JobBuilder::new().name("empty".to_string()).build();
/// let parameters = JobParametersBuilder::new()
///     .add_long("startAt", 42)
///     .to_job_parameters();
///
/// let execution = launcher.run(&job, parameters).unwrap();
/// assert!(execution.step_executions.is_empty());
/// assert!(!launcher.is_running("empty", &execution.parameters));
/// ```
#[derive(Default)]
pub struct JobLauncher {
    active_runs: Mutex<HashSet<RunKey>>,
}

/// Removes its run from the active set when dropped, even on panic.
struct ActiveRun<'a> {
    launcher: &'a JobLauncher,
    key: RunKey,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.launcher.active_runs().remove(&self.key);
    }
}

impl JobLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `job` with `parameters` on the calling thread.
    ///
    /// # Errors
    /// - `BatchError::JobExecutionAlreadyRunning` when an identical run is active
    /// - any error returned by the job itself
    pub fn run(&self, job: &dyn Job, parameters: JobParameters) -> JobResult<JobExecution> {
        let _active_run = self.register(job.get_name(), &parameters)?;

        info!(
            "Job: [{}] launched with the following parameters: [{}], status: {:?}",
            job.get_name(),
            parameters,
            BatchStatus::Started
        );

        match job.run(&parameters) {
            Ok(execution) => {
                info!(
                    "Job: [{}] completed with the following parameters: [{}] and the following status: [{:?}] in {:?}",
                    job.get_name(),
                    parameters,
                    execution.status,
                    execution.duration
                );
                Ok(execution)
            }
            Err(err) => {
                error!(
                    "Job: [{}] with the following parameters: [{}] ended with status [{:?}]: {}",
                    job.get_name(),
                    parameters,
                    BatchStatus::Failed,
                    err
                );
                Err(err)
            }
        }
    }

    /// Tells whether a run of `job_name` with `parameters` is active.
    pub fn is_running(&self, job_name: &str, parameters: &JobParameters) -> bool {
        self.active_runs().contains(&RunKey {
            job_name: job_name.to_string(),
            parameters: parameters.clone(),
        })
    }

    fn register(&self, job_name: &str, parameters: &JobParameters) -> JobResult<ActiveRun<'_>> {
        let key = RunKey {
            job_name: job_name.to_string(),
            parameters: parameters.clone(),
        };

        if !self.active_runs().insert(key.clone()) {
            warn!(
                "Job: [{}] with parameters [{}] is already running",
                job_name, parameters
            );
            return Err(BatchError::JobExecutionAlreadyRunning(format!(
                "{} {}",
                job_name, parameters
            )));
        }

        Ok(ActiveRun {
            launcher: self,
            key,
        })
    }

    fn active_runs(&self) -> MutexGuard<'_, HashSet<RunKey>> {
        self.active_runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
