use std::{
    fmt::Debug,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::info;

use crate::core::item::{ItemWriter, ItemWriterResult};

/// Writer logging every item at info level instead of persisting it.
///
/// Used for dry runs: the pipeline reads and filters as usual and the
/// surviving records only end up in the log.
#[derive(Default)]
pub struct LoggerWriter {
    logged: AtomicUsize,
}

impl LoggerWriter {
    /// Number of items logged so far.
    pub fn logged_count(&self) -> usize {
        self.logged.load(Ordering::Relaxed)
    }
}

impl<T> ItemWriter<T> for LoggerWriter
where
    T: Debug,
{
    fn write(&self, items: &[T]) -> ItemWriterResult {
        items.iter().for_each(|item| info!("Record: {:?}", item));
        self.logged.fetch_add(items.len(), Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::LoggerWriter;
    use crate::core::item::ItemWriter;

    #[test]
    fn counts_logged_items() {
        let writer = LoggerWriter::default();

        writer.write(&["a", "b"]).unwrap();
        writer.write(&["c"]).unwrap();

        assert_eq!(writer.logged_count(), 3);
    }
}
