use log::{info, warn};
use sqlx::SqlitePool;
use tokio::runtime::Handle;

use crate::{
    core::{
        item::ItemWriter,
        job::{Job, JobBuilder, JobExecution, JobParameters, JobResult},
        step::StepBuilder,
    },
    item::{csv::csv_reader::CsvItemReaderBuilder, logger::LoggerWriter, rdbc::SqliteItemWriter},
    settings::Settings,
    BatchError,
};

use super::{
    model::{Customer, CustomerBinder, CUSTOMER_COLUMNS, CUSTOMER_TABLE},
    processor::CountryFilterProcessor,
};

/// Name of the customer import job.
pub const IMPORT_CUSTOMERS_JOB: &str = "importCustomers";

/// Name of its single chunk-oriented step.
pub const CSV_STEP: &str = "csv-step";

/// Creates the customers table if it does not exist yet.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), BatchError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY,
            first_name TEXT,
            last_name TEXT,
            email TEXT,
            gender TEXT,
            contact_no TEXT,
            country TEXT,
            dob TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|error| BatchError::ItemWriter(format!("cannot create customers table: {}", error)))?;

    Ok(())
}

/// Imports the customers of one country from a CSV file into SQLite.
///
/// Every run builds its own reader, filter and writer from the settings, so
/// the file is read from its first line each time. Lines that cannot be
/// mapped to a [`Customer`] are skipped. Each chunk of surviving customers is
/// upserted by id in its own transaction; a failing chunk fails the run.
pub struct CustomerImportJob {
    settings: Settings,
    pool: SqlitePool,
    handle: Handle,
    dry_run: bool,
}

impl CustomerImportJob {
    /// Creates the job. Database calls are driven on `handle`.
    pub fn new(settings: Settings, pool: SqlitePool, handle: Handle) -> Self {
        Self {
            settings,
            pool,
            handle,
            dry_run: false,
        }
    }

    /// In a dry run, surviving customers are logged instead of persisted.
    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }
}

impl Job for CustomerImportJob {
    fn get_name(&self) -> &str {
        IMPORT_CUSTOMERS_JOB
    }

    fn run(&self, parameters: &JobParameters) -> JobResult<JobExecution> {
        self.settings.validate()?;

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .strict(false)
            .delimiter(self.settings.delimiter_byte()?)
            .from_path(&self.settings.input_path)?;

        let processor = CountryFilterProcessor::new(&self.settings.target_country);

        let binder = CustomerBinder;
        let mut sqlite_writer = SqliteItemWriter::<Customer>::new(self.handle.clone())
            .pool(&self.pool)
            .table(CUSTOMER_TABLE)
            .conflict_key("id")
            .item_binder(&binder);
        for column in CUSTOMER_COLUMNS {
            sqlite_writer = sqlite_writer.add_column(column);
        }
        let logger_writer = LoggerWriter::default();

        let writer: &(dyn ItemWriter<Customer> + Sync) = if self.dry_run {
            &logger_writer
        } else {
            &sqlite_writer
        };

        let step = StepBuilder::new(CSV_STEP)
            .chunk::<Customer, Customer>(self.settings.chunk_size)
            .reader(&reader)
            .processor(&processor)
            .writer(writer)
            .concurrency_limit(self.settings.concurrency_limit)
            .build();

        let job = JobBuilder::new()
            .name(IMPORT_CUSTOMERS_JOB.to_string())
            .start(&step)
            .build();

        let result = job.run(parameters);

        if reader.skip_count() > 0 {
            warn!(
                "{} malformed lines skipped in {}",
                reader.skip_count(),
                self.settings.input_path.display()
            );
        }
        if self.dry_run {
            info!("Dry run: {} customers logged", logger_writer.logged_count());
        }

        result
    }
}
