use thiserror::Error;

#[derive(Error, Debug)]
/// Batch error
pub enum BatchError {
    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    #[error("ItemReader from: {0}")]
    ItemReader(String),

    #[error("ItemProcessor from: {0}")]
    ItemProcessor(String),

    #[error("Step failed: {0}")]
    Step(String),

    /// A run with the same job name and parameters is still active.
    #[error("Job execution already running: {0}")]
    JobExecutionAlreadyRunning(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
