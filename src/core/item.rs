use crate::error::BatchError;

/// Result of reading one item.
///
/// - `Ok(Some(item))` when an item was read
/// - `Ok(None)` when the source is exhausted
/// - `Err(BatchError)` when the item could not be read
pub type ItemReaderResult<I> = Result<Option<I>, BatchError>;

/// Result of processing one item.
///
/// `Ok(None)` means the item is filtered out: it is dropped from the chunk
/// and never reaches the writer. Filtering is not an error.
pub type ItemProcessorResult<O> = Result<Option<O>, BatchError>;

/// Result of writing a chunk of items.
pub type ItemWriterResult = Result<(), BatchError>;

/// Retrieves input for a step, one item at a time.
pub trait ItemReader<I> {
    /// Reads the next item, `Ok(None)` once the source is exhausted.
    fn read(&self) -> ItemReaderResult<I>;
}

/// Business logic applied to each item between the reader and the writer.
pub trait ItemProcessor<I, O> {
    /// Processes an item.
    ///
    /// Returning `Ok(None)` filters the item out of the chunk.
    fn process(&self, item: &I) -> ItemProcessorResult<O>;
}

/// Output of a step, one chunk of items at a time.
pub trait ItemWriter<O> {
    /// Writes a whole chunk. Implementations must treat the chunk as one unit.
    fn write(&self, items: &[O]) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}

/// Processor handing every item to the writer unchanged.
#[derive(Default)]
pub struct PassThroughProcessor;

impl<T: Clone> ItemProcessor<T, T> for PassThroughProcessor {
    fn process(&self, item: &T) -> ItemProcessorResult<T> {
        Ok(Some(item.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemProcessor, PassThroughProcessor};

    #[test]
    fn pass_through_keeps_item() {
        let processor = PassThroughProcessor;
        let item = "United States".to_string();

        let result = processor.process(&item).unwrap();

        assert_eq!(result, Some(item));
    }
}
