use std::{
    collections::BTreeMap,
    fmt,
    time::{Duration, Instant},
};

use log::{error, info};
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    step::{Step, StepExecution},
};

/// Type alias for job execution results.
pub type JobResult<T> = Result<T, BatchError>;

/// Status of a job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Status of a batch job that is running.
    Started,
    /// The batch job has successfully completed its execution.
    Completed,
    /// Status of a batch job that has failed during its execution.
    Failed,
}

/// A single typed job parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobParameter {
    Long(i64),
    String(String),
}

impl fmt::Display for JobParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobParameter::Long(value) => write!(f, "{}", value),
            JobParameter::String(value) => write!(f, "{}", value),
        }
    }
}

/// Parameters identifying a run of a job.
///
/// Two runs of the same job with equal parameters are the same job instance,
/// which the [`JobLauncher`](super::launcher::JobLauncher) refuses to run twice
/// at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JobParameters {
    parameters: BTreeMap<String, JobParameter>,
}

impl JobParameters {
    pub fn get(&self, key: &str) -> Option<&JobParameter> {
        self.parameters.get(key)
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.parameters.get(key) {
            Some(JobParameter::Long(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl fmt::Display for JobParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (key, value)) in self.parameters.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Builder for [`JobParameters`].
///
/// # Example
///
/// ```
/// use customer_batch::core::job::JobParametersBuilder;
///
/// let parameters = JobParametersBuilder::new()
///     .add_long("startAt", 1_700_000_000_000)
///     .add_string("source", "customers.csv")
///     .to_job_parameters();
///
/// assert_eq!(parameters.get_long("startAt"), Some(1_700_000_000_000));
/// assert_eq!(parameters.to_string(), "{source=customers.csv, startAt=1700000000000}");
/// ```
#[derive(Default)]
pub struct JobParametersBuilder {
    parameters: BTreeMap<String, JobParameter>,
}

impl JobParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_long(mut self, key: &str, value: i64) -> Self {
        self.parameters
            .insert(key.to_string(), JobParameter::Long(value));
        self
    }

    pub fn add_string(mut self, key: &str, value: &str) -> Self {
        self.parameters
            .insert(key.to_string(), JobParameter::String(value.to_string()));
        self
    }

    pub fn to_job_parameters(self) -> JobParameters {
        JobParameters {
            parameters: self.parameters,
        }
    }
}

/// Represents a job that can be executed.
///
/// A job is a container for a sequence of steps that are executed in order.
pub trait Job {
    fn get_name(&self) -> &str;

    /// Runs the job with the given parameters.
    ///
    /// # Returns
    /// - `Ok(JobExecution)` when every step completed
    /// - `Err(BatchError)` when a step failed
    fn run(&self, parameters: &JobParameters) -> JobResult<JobExecution>;
}

/// Represents the execution of a job.
#[derive(Debug)]
pub struct JobExecution {
    pub id: Uuid,
    pub name: String,
    pub parameters: JobParameters,
    pub status: BatchStatus,
    /// The time when the job started executing
    pub start: Instant,
    /// The time when the job finished executing
    pub end: Instant,
    /// The total duration of the job execution
    pub duration: Duration,
    /// One entry per executed step, in execution order
    pub step_executions: Vec<StepExecution>,
}

/// An instance of a job: a name and the steps to run in order.
pub struct JobInstance<'a> {
    id: Uuid,
    name: String,
    steps: Vec<&'a dyn Step>,
}

impl Job for JobInstance<'_> {
    fn get_name(&self) -> &str {
        &self.name
    }

    /// Runs the job by executing its steps in sequence.
    ///
    /// The first failing step aborts the job with `BatchError::Step`.
    fn run(&self, parameters: &JobParameters) -> JobResult<JobExecution> {
        let start = Instant::now();

        info!(
            "Start of job: {}, id: {}, parameters: {}",
            self.name, self.id, parameters
        );

        let mut step_executions = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let mut step_execution = StepExecution::new(step.get_name());
            let result = step.execute(&mut step_execution);

            info!(
                "Step {} ended with {:?}: read={}, filtered={}, written={}, read_errors={}, write_errors={}",
                step_execution.name,
                step_execution.status,
                step_execution.read_count,
                step_execution.filter_count,
                step_execution.write_count,
                step_execution.read_error_count,
                step_execution.write_error_count
            );

            if let Err(err) = result {
                error!("Job {} failed at step {}: {}", self.name, step.get_name(), err);
                return Err(BatchError::Step(step.get_name().to_owned()));
            }

            step_executions.push(step_execution);
        }

        info!("End of job: {}, id: {}", self.name, self.id);

        Ok(JobExecution {
            id: self.id,
            name: self.name.clone(),
            parameters: parameters.clone(),
            status: BatchStatus::Completed,
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            step_executions,
        })
    }
}

/// Builder for creating a job instance.
///
/// # Example
///
/// ```ignore
/// use customer_batch::core::job::JobBuilder;
///
/// let job = JobBuilder::new()
///     .name("importCustomers".to_string())
///     .start(&csv_step)
///     .build();
/// ```
#[derive(Default)]
pub struct JobBuilder<'a> {
    /// Optional name for the job (generated randomly if not specified)
    name: Option<String>,
    /// Collection of steps to be executed, in order
    steps: Vec<&'a dyn Step>,
}

impl<'a> JobBuilder<'a> {
    /// Creates a builder with no steps and no name.
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
        }
    }

    /// Sets the name of the job.
    ///
    /// The name and the job parameters identify a run for the launcher.
    /// Without a name, a random one is generated.
    pub fn name(mut self, name: String) -> JobBuilder<'a> {
        self.name = Some(name);
        self
    }

    /// Sets the first step of the job.
    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Adds a step to the job. Steps are executed in the order they are added.
    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Builds the job with a fresh id.
    pub fn build(self) -> JobInstance<'a> {
        JobInstance {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
        }
    }
}
