#[cfg(feature = "logger")]
/// This module provides a logger item writer, used for dry runs.
pub mod logger;

#[cfg(feature = "csv")]
/// This module provides a CSV item reader.
pub mod csv;

#[cfg(feature = "rdbc")]
/// This module provides relational database item writers.
pub mod rdbc;
