//! CSV support for reading delimited flat files.
//!
//! The reader maps each line positionally onto a serde-deserializable type.
//! It can skip a header line, use any single-byte delimiter, and either
//! report malformed lines as errors (strict) or skip them (lenient).
//!
//! # Example
//!
//! ```
//! use customer_batch::item::csv::csv_reader::CsvItemReaderBuilder;
//! use customer_batch::core::item::ItemReader;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, PartialEq)]
//! struct City {
//!     city: String,
//!     country: String,
//!     pop: u32,
//! }
//!
//! let csv_data = "\
//! city,country,pop
//! Boston,United States,4628910
//! Concord,United States,42695
//! ";
//!
//! let reader = CsvItemReaderBuilder::new()
//!     .has_headers(true)
//!     .delimiter(b',')
//!     .from_reader(csv_data.as_bytes());
//!
//! let mut cities: Vec<City> = Vec::new();
//! while let Some(city) = reader.read().unwrap() {
//!     cities.push(city);
//! }
//!
//! assert_eq!(cities.len(), 2);
//! assert_eq!(cities[0].city, "Boston");
//! assert_eq!(cities[1].pop, 42695);
//! ```

/// A module providing facilities for reading CSV data records.
pub mod csv_reader;
