use csv::{ErrorKind, ReaderBuilder, StringRecordsIntoIter, Terminator, Trim};
use log::warn;
use serde::de::DeserializeOwned;
use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::Read,
    path::Path,
};

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::BatchError,
};

/// A CSV item reader that implements the `ItemReader` trait.
///
/// Each line is split on the configured delimiter and its tokens are mapped
/// positionally onto the fields of the target type, in declaration order.
/// Column names in the header line play no part in the mapping.
///
/// # Strict and lenient modes
///
/// - strict: a malformed line (wrong number of tokens, a token that does not
///   parse into its field) is returned as `Err(BatchError::ItemReader)` and the
///   step's skip limit decides what happens next.
/// - lenient (`strict(false)`): the malformed line is logged, counted in
///   [`CsvItemReader::skip_count`] and skipped. Reading goes on with the next line.
///
/// # Examples
///
/// ```
/// use customer_batch::item::csv::csv_reader::CsvItemReaderBuilder;
/// use customer_batch::core::item::ItemReader;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Record {
///     name: String,
///     value: i32,
/// }
///
/// let data = "\
/// label,amount
/// foo,123
/// bar,not-a-number
/// baz,456
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .has_headers(true)
///     .strict(false)
///     .from_reader(data.as_bytes());
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "foo");
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "baz");
/// assert_eq!(record.value, 456);
///
/// assert!(ItemReader::<Record>::read(&reader).unwrap().is_none());
/// assert_eq!(reader.skip_count(), 1);
/// ```
pub struct CsvItemReader<R> {
    /// Iterator over the CSV records
    ///
    /// Uses `RefCell` so we can iterate through records while keeping the
    /// `read` method signature compatible with the `ItemReader` trait.
    records: RefCell<StringRecordsIntoIter<R>>,
    strict: bool,
    skip_count: Cell<usize>,
}

impl<R> CsvItemReader<R> {
    /// Number of malformed lines skipped so far in lenient mode.
    pub fn skip_count(&self) -> usize {
        self.skip_count.get()
    }
}

impl<R: Read, T: DeserializeOwned> ItemReader<T> for CsvItemReader<R> {
    /// Reads the next item from the CSV source.
    ///
    /// # Returns
    /// - `Ok(Some(record))` if a record is successfully read
    /// - `Ok(None)` if there are no more records to read
    /// - `Err(BatchError::ItemReader(error))` if a line is malformed (strict mode
    ///   only) or if the source itself cannot be read
    fn read(&self) -> ItemReaderResult<T> {
        loop {
            let Some(result) = self.records.borrow_mut().next() else {
                return Ok(None);
            };

            // Only malformed lines may be skipped, never a failing source.
            if let Err(error) = &result {
                if let ErrorKind::Io(io_error) = error.kind() {
                    return Err(BatchError::ItemReader(format!(
                        "cannot read CSV source: {}",
                        io_error
                    )));
                }
            }

            let line = result
                .as_ref()
                .ok()
                .and_then(|record| record.position())
                .map(|position| position.line());

            let parsed = result
                .map_err(|error| error.to_string())
                .and_then(|string_record| {
                    string_record
                        .deserialize::<T>(None)
                        .map_err(|error| error.to_string())
                });

            match parsed {
                Ok(record) => return Ok(Some(record)),
                Err(error) if self.strict => return Err(BatchError::ItemReader(error)),
                Err(error) => {
                    self.skip_count.set(self.skip_count.get() + 1);
                    match line {
                        Some(line) => warn!("Skipping malformed line {}: {}", line, error),
                        None => warn!("Skipping malformed line: {}", error),
                    }
                }
            }
        }
    }
}

/// A builder for configuring CSV item reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Terminator: CRLF (also accepts LF)
/// - Headers: disabled
/// - Strict: enabled
/// - Trimming: All fields trimmed
///
/// # Examples
///
/// ```
/// use customer_batch::item::csv::csv_reader::CsvItemReaderBuilder;
/// use csv::Terminator;
///
/// let reader = CsvItemReaderBuilder::new()
///     .delimiter(b';')
///     .terminator(Terminator::Any(b'\n'))
///     .has_headers(true)
///     .from_reader("name;age\nAlice;30".as_bytes());
/// ```
pub struct CsvItemReaderBuilder {
    delimiter: u8,
    terminator: Terminator,
    has_headers: bool,
    strict: bool,
}

impl Default for CsvItemReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            terminator: Terminator::CRLF,
            has_headers: false,
            strict: true,
        }
    }

    /// Sets the delimiter character for the CSV parsing.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the line terminator for the CSV parsing.
    ///
    /// - `Terminator::CRLF`: accepts `\r\n`, `\r` and `\n` (default)
    /// - `Terminator::Any(byte)`: custom terminator
    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Sets whether the first line is a header.
    ///
    /// When enabled, the first line is skipped whatever it contains.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Sets whether malformed lines are returned as errors (`true`) or
    /// skipped (`false`).
    pub fn strict(mut self, yes: bool) -> Self {
        self.strict = yes;
        self
    }

    fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(self.has_headers)
            // Lenient mode leaves token counts to the field mapping, so a
            // header of any width never invalidates the data lines.
            .flexible(!self.strict);
        builder
    }

    /// Creates a `CsvItemReader` from any source implementing `Read`.
    pub fn from_reader<R: Read>(self, rdr: R) -> CsvItemReader<R> {
        let records = self.reader_builder().from_reader(rdr).into_records();

        CsvItemReader {
            records: RefCell::new(records),
            strict: self.strict,
            skip_count: Cell::new(0),
        }
    }

    /// Creates a `CsvItemReader` from a file path.
    ///
    /// # Errors
    /// `BatchError::ItemReader` if the file cannot be opened.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvItemReader<File>, BatchError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| {
            BatchError::ItemReader(format!("cannot open {}: {}", path.display(), error))
        })?;

        Ok(self.from_reader(file))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use csv::StringRecord;
    use serde::Deserialize;

    use crate::core::item::ItemReader;
    use crate::error::BatchError;
    use crate::item::csv::csv_reader::CsvItemReaderBuilder;

    #[derive(Debug, Deserialize, PartialEq)]
    struct City {
        city: String,
        country: String,
        pop: u32,
    }

    #[test]
    fn records_are_split_and_trimmed() -> Result<(), Box<dyn Error>> {
        let data = "city,country,pop
        Boston,United States,4628910
        Concord,United States,42695";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .from_reader(data.as_bytes());

        let records = reader
            .records
            .into_inner()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()?;

        assert_eq!(
            records,
            vec![
                vec!["Boston", "United States", "4628910"],
                vec!["Concord", "United States", "42695"],
            ]
        );

        Ok(())
    }

    #[test]
    fn header_is_skipped_even_when_it_looks_like_data() {
        let data = "Paris,France,2102650\nLyon,France,522250";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let city: City = reader.read().unwrap().unwrap();
        assert_eq!(city.city, "Lyon");
        assert!(ItemReader::<City>::read(&reader).unwrap().is_none());
    }

    #[test]
    fn fields_are_mapped_by_position_not_header_name() {
        let data = "a,b,c\nOslo,Norway,709037";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let city: City = reader.read().unwrap().unwrap();
        assert_eq!(
            city,
            City {
                city: "Oslo".to_string(),
                country: "Norway".to_string(),
                pop: 709037
            }
        );
    }

    #[test]
    fn strict_reader_reports_short_line() {
        let data = "city,country,pop\nBoston,United States\nConcord,United States,42695";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let first: Result<Option<City>, BatchError> = reader.read();
        assert!(matches!(first, Err(BatchError::ItemReader(_))));

        let second: City = reader.read().unwrap().unwrap();
        assert_eq!(second.city, "Concord");
    }

    #[test]
    fn lenient_reader_skips_malformed_lines() {
        let data = "city,country,pop
Boston,United States
Springfield,United States,abc
Concord,United States,42695";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .strict(false)
            .from_reader(data.as_bytes());

        let city: City = reader.read().unwrap().unwrap();
        assert_eq!(city.city, "Concord");
        assert!(ItemReader::<City>::read(&reader).unwrap().is_none());
        assert_eq!(reader.skip_count(), 2);
    }

    #[test]
    fn lenient_reader_accepts_header_of_any_width() {
        let data = "header\nDenver,United States,715522";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .strict(false)
            .from_reader(data.as_bytes());

        let city: City = reader.read().unwrap().unwrap();
        assert_eq!(city.pop, 715522);
    }

    #[test]
    fn missing_file_is_a_reader_error() {
        let result = CsvItemReaderBuilder::new().from_path("does/not/exist.csv");

        assert!(matches!(result, Err(BatchError::ItemReader(_))));
    }

    struct BrokenSource;

    impl std::io::Read for BrokenSource {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device unplugged"))
        }
    }

    #[test]
    fn lenient_reader_reports_unreadable_source() {
        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .strict(false)
            .from_reader(BrokenSource);

        let result = ItemReader::<City>::read(&reader);

        assert!(matches!(
            result,
            Err(BatchError::ItemReader(message)) if message.contains("device unplugged")
        ));
        assert_eq!(reader.skip_count(), 0);
    }
}
