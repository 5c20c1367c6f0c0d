//! Customer import: the record, its country filter and the job wiring them
//! to the CSV reader and the SQLite writer.

pub mod job;

pub mod model;

pub mod processor;

pub use job::{create_schema, CustomerImportJob, CSV_STEP, IMPORT_CUSTOMERS_JOB};
pub use model::{Customer, CustomerBinder, CUSTOMER_COLUMNS, CUSTOMER_TABLE};
pub use processor::CountryFilterProcessor;
