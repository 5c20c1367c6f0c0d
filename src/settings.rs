use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::BatchError;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "customer-batch.toml";

/// Settings of the customer import.
///
/// Loaded from an optional TOML file, then from environment variables
/// prefixed with `CUSTOMER_BATCH_` (for example `CUSTOMER_BATCH_CHUNK_SIZE=50`).
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// CSV file to import
    pub input_path: PathBuf,
    /// SQLx connection string of the target database
    pub database_url: String,
    /// Only customers from this country are persisted
    pub target_country: String,
    /// Number of records read, filtered and written together
    pub chunk_size: usize,
    /// Number of chunks filtered and written at the same time
    pub concurrency_limit: usize,
    /// Field delimiter, a single ASCII character
    pub delimiter: String,
    /// Address of the HTTP trigger
    pub bind_address: String,
}

impl Settings {
    /// Loads settings from `path` if present, then the environment.
    pub fn load_from(path: &Path) -> Result<Self, BatchError> {
        let config = Self::builder(path)
            .map_err(to_batch_error)?
            .add_source(
                Environment::with_prefix("CUSTOMER_BATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(to_batch_error)?;

        Self::from_config(config)
    }

    fn builder(
        path: &Path,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("input_path", "data/customers.csv")?
            .set_default("database_url", "sqlite://customers.db?mode=rwc")?
            .set_default("target_country", "United States")?
            .set_default("chunk_size", 10)?
            .set_default("concurrency_limit", 10)?
            .set_default("delimiter", ",")?
            .set_default("bind_address", "0.0.0.0:8080")?
            .add_source(File::from(path).required(false)))
    }

    fn from_config(config: Config) -> Result<Self, BatchError> {
        let settings = config
            .try_deserialize::<Settings>()
            .map_err(to_batch_error)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.concurrency_limit == 0 {
            return Err(BatchError::Configuration(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }
        self.delimiter_byte()?;
        Ok(())
    }

    /// The delimiter as the byte expected by the CSV reader.
    pub fn delimiter_byte(&self) -> Result<u8, BatchError> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(BatchError::Configuration(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ))),
        }
    }
}

fn to_batch_error(error: ConfigError) -> BatchError {
    BatchError::Configuration(error.to_string())
}
