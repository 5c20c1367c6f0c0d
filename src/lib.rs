#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Customer batch

 A chunk-oriented batch job importing customers from a CSV file into SQLite.

 The job reads the file ten lines at a time, keeps the customers living in the
 target country, and upserts each chunk of survivors by id in one transaction.
 It runs once from the command line or each time `POST /jobs/importCustomers`
 is called.

 ## Core Concepts

- **Job:** the entire batch process, made of one or more `Step`s run in order.
- **Step:** a read-process-write loop over chunks of items.
- **ItemReader:** retrieves input for a `Step`, one item at a time.
- **ItemProcessor:** business logic applied to each item. Returning `Ok(None)`
  filters the item out of its chunk.
- **ItemWriter:** output of a `Step`, one chunk of items at a time.
- **JobLauncher:** runs a job with its `JobParameters` and refuses to start a
  run whose job name and parameters match a run still in progress.

 ## Features

| **Feature**   | **Description**                                    |
|---------------|----------------------------------------------------|
| csv           | Enables the CSV `ItemReader`                       |
| rdbc-sqlite   | Enables the SQLite upserting `ItemWriter`          |
| logger        | Enables a logger `ItemWriter`, used for dry runs   |
| full          | Enables all available features                     |

 The customer job and the HTTP trigger need all three.

 ## Getting Started

```rust
# use serde::Deserialize;
# use customer_batch::{
#     core::{
#         item::{ItemProcessor, ItemProcessorResult, ItemWriter, ItemWriterResult},
#         job::{Job, JobBuilder, JobParametersBuilder},
#         launcher::JobLauncher,
#         step::StepBuilder,
#     },
#     error::BatchError,
#     item::csv::csv_reader::CsvItemReaderBuilder,
# };
# use std::sync::Mutex;
# #[derive(Deserialize, Debug, Clone)]
# struct Car {
#     year: u16,
#     make: String,
# }
# struct VintageFilter;
# impl ItemProcessor<Car, Car> for VintageFilter {
#     fn process(&self, item: &Car) -> ItemProcessorResult<Car> {
#         Ok((item.year < 1970).then(|| item.clone()))
#     }
# }
# #[derive(Default)]
# struct VecWriter(Mutex<Vec<Car>>);
# impl ItemWriter<Car> for VecWriter {
#     fn write(&self, items: &[Car]) -> ItemWriterResult {
#         self.0.lock().unwrap().extend_from_slice(items);
#         Ok(())
#     }
# }
fn main() -> Result<(), BatchError> {
    let csv = "year,make
   1948,Porsche
   1995,Peugeot
   1967,Ford";

    let reader = CsvItemReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv.as_bytes());

    let processor = VintageFilter;
    let writer = VecWriter::default();

    let step = StepBuilder::new("vintage-cars")
        .chunk::<Car, Car>(2)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build();

    let job = JobBuilder::new().name("cars".to_string()).start(&step).build();
    let parameters = JobParametersBuilder::new()
        .add_long("startAt", 1)
        .to_job_parameters();

    let execution = JobLauncher::new().run(&job, parameters)?;

    assert_eq!(execution.step_executions[0].filter_count, 1);
    assert_eq!(writer.0.lock().unwrap().len(), 2);

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
 -   MIT license

 at your option.
 */

/// Core module for batch operations
pub mod core;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of item readers / writers (CSV reader, SQLite writer, logger writer)
pub mod item;

/// Settings loaded from file and environment
pub mod settings;

#[cfg(all(feature = "csv", feature = "rdbc-sqlite", feature = "logger"))]
/// The customer import job
pub mod customer;

#[cfg(all(feature = "csv", feature = "rdbc-sqlite", feature = "logger"))]
/// HTTP trigger of the customer import
pub mod server;
