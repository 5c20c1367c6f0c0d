use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    item::{ItemProcessor, ItemReader, ItemWriter},
};

#[derive(Debug, PartialEq)]
pub enum ChunkStatus {
    /// The chunk holds `chunk_size` items, more may follow.
    Full,
    /// The reader is exhausted, the chunk holds the remaining items.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Starting,
    Started,
    Success,
    ReadError,
    ProcessorError,
    WriteError,
}

/// Runtime information about one execution of a step.
#[derive(Debug, Clone)]
pub struct StepExecution {
    /// Unique identifier for this step execution
    pub id: Uuid,
    /// Human-readable name for the step
    pub name: String,
    /// Current status of the step execution
    pub status: StepStatus,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
    /// Number of items successfully read
    pub read_count: usize,
    /// Number of items dropped by the processor
    pub filter_count: usize,
    /// Number of items successfully written
    pub write_count: usize,
    /// Number of errors encountered during reading
    pub read_error_count: usize,
    /// Number of errors encountered during processing
    pub process_error_count: usize,
    /// Number of items whose chunk failed to be written
    pub write_error_count: usize,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            start_time: now,
            end_time: now,
            duration: Duration::default(),
            read_count: 0,
            filter_count: 0,
            write_count: 0,
            read_error_count: 0,
            process_error_count: 0,
            write_error_count: 0,
        }
    }
}

pub trait Step {
    fn get_name(&self) -> &str;

    /// Executes the step.
    ///
    /// Counters and status are recorded on `step_execution` whatever the outcome.
    ///
    /// # Returns
    /// - `Ok(())`: the step completed successfully
    /// - `Err(BatchError::Step)`: the step failed
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError>;
}

/// Counters produced by processing and writing one chunk.
#[derive(Default)]
struct ChunkReport {
    filter_count: usize,
    process_error_count: usize,
    write_count: usize,
    write_error_count: usize,
    failure: Option<StepStatus>,
}

impl ChunkReport {
    fn failed(status: StepStatus) -> Self {
        Self {
            failure: Some(status),
            ..Default::default()
        }
    }
}

/// A step reading, processing and writing items chunk by chunk.
///
/// Reading is always done on the calling thread. When `concurrency_limit` is
/// greater than one, up to that many chunks are read, then processed and
/// written in parallel on scoped threads before the next wave is read.
pub struct ChunkOrientedStep<'a, I, O> {
    name: String,
    /// Component responsible for reading items from the source
    reader: &'a dyn ItemReader<I>,
    /// Component responsible for processing items
    processor: &'a (dyn ItemProcessor<I, O> + Sync),
    /// Component responsible for writing items to the destination
    writer: &'a (dyn ItemWriter<O> + Sync),
    /// Number of items to process in each chunk
    chunk_size: usize,
    /// Maximum number of errors allowed before failing the step
    skip_limit: usize,
    /// Maximum number of chunks processed and written at the same time
    concurrency_limit: usize,
}

impl<I: Send, O> Step for ChunkOrientedStep<'_, I, O> {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let start_time = Instant::now();
        step_execution.status = StepStatus::Started;

        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        Self::manage_error(self.writer.open());

        let errors = AtomicUsize::new(0);

        loop {
            let mut wave: Vec<Vec<I>> = Vec::with_capacity(self.concurrency_limit);
            let mut finished = false;
            let mut read_failed = false;

            while wave.len() < self.concurrency_limit {
                match self.read_chunk(step_execution, &errors) {
                    Ok((items, chunk_status)) => {
                        if !items.is_empty() {
                            wave.push(items);
                        }
                        if chunk_status == ChunkStatus::Finished {
                            finished = true;
                            break;
                        }
                    }
                    Err(_) => {
                        read_failed = true;
                        break;
                    }
                }
            }

            let mut failure = None;
            for report in self.process_wave(wave, &errors) {
                step_execution.filter_count += report.filter_count;
                step_execution.process_error_count += report.process_error_count;
                step_execution.write_count += report.write_count;
                step_execution.write_error_count += report.write_error_count;
                if failure.is_none() {
                    failure = report.failure;
                }
            }

            if let Some(status) = failure {
                step_execution.status = status;
                break;
            }

            if read_failed {
                step_execution.status = StepStatus::ReadError;
                break;
            }

            if finished {
                step_execution.status = StepStatus::Success;
                break;
            }
        }

        Self::manage_error(self.writer.close());

        info!(
            "End of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        step_execution.start_time = start_time;
        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        if StepStatus::Success == step_execution.status {
            Ok(())
        } else {
            Err(BatchError::Step(step_execution.name.clone()))
        }
    }
}

impl<I: Send, O> ChunkOrientedStep<'_, I, O> {
    /// Reads a chunk of items from the reader.
    ///
    /// Stops when the chunk is full, when the reader is exhausted or when the
    /// skip limit is exceeded by a read error.
    fn read_chunk(
        &self,
        step_execution: &mut StepExecution,
        errors: &AtomicUsize,
    ) -> Result<(Vec<I>, ChunkStatus), BatchError> {
        debug!("Start reading chunk");

        let mut read_items = Vec::with_capacity(self.chunk_size);

        loop {
            match self.reader.read() {
                Ok(Some(item)) => {
                    read_items.push(item);
                    step_execution.read_count += 1;

                    if read_items.len() >= self.chunk_size {
                        debug!("End reading chunk: FULL");
                        return Ok((read_items, ChunkStatus::Full));
                    }
                }
                Ok(None) => {
                    debug!("End reading chunk: FINISHED");
                    return Ok((read_items, ChunkStatus::Finished));
                }
                Err(error) => {
                    warn!("Error reading item: {}", error);
                    step_execution.read_error_count += 1;

                    if Self::is_skip_limit_reached(errors, 1, self.skip_limit) {
                        error!("Skip limit reached while reading, step stops");
                        return Err(error);
                    }
                }
            }
        }
    }

    /// Processes and writes every chunk of a wave, in parallel when there is
    /// more than one.
    fn process_wave(&self, wave: Vec<Vec<I>>, errors: &AtomicUsize) -> Vec<ChunkReport> {
        let processor = self.processor;
        let writer = self.writer;
        let skip_limit = self.skip_limit;

        if wave.len() <= 1 {
            return wave
                .into_iter()
                .map(|chunk| Self::process_and_write(processor, writer, skip_limit, chunk, errors))
                .collect();
        }

        debug!("Dispatching {} chunks to worker threads", wave.len());

        thread::scope(|scope| {
            let handles: Vec<_> = wave
                .into_iter()
                .map(|chunk| {
                    scope.spawn(move || {
                        Self::process_and_write(processor, writer, skip_limit, chunk, errors)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(report) => report,
                    Err(_) => {
                        error!("Chunk worker panicked");
                        ChunkReport::failed(StepStatus::WriteError)
                    }
                })
                .collect()
        })
    }

    /// Filters a chunk through the processor and writes the surviving items
    /// as one unit.
    fn process_and_write(
        processor: &(dyn ItemProcessor<I, O> + Sync),
        writer: &(dyn ItemWriter<O> + Sync),
        skip_limit: usize,
        chunk: Vec<I>,
        errors: &AtomicUsize,
    ) -> ChunkReport {
        debug!("Processing chunk of {} items", chunk.len());

        let mut report = ChunkReport::default();
        let mut processed_items = Vec::with_capacity(chunk.len());

        for item in &chunk {
            match processor.process(item) {
                Ok(Some(processed)) => processed_items.push(processed),
                Ok(None) => report.filter_count += 1,
                Err(error) => {
                    warn!("Error processing item: {}", error);
                    report.process_error_count += 1;

                    if Self::is_skip_limit_reached(errors, 1, skip_limit) {
                        report.failure = Some(StepStatus::ProcessorError);
                        return report;
                    }
                }
            }
        }

        if processed_items.is_empty() {
            debug!("No items to write, skipping write call");
            return report;
        }

        debug!("Writing chunk of {} items", processed_items.len());

        match writer.write(&processed_items) {
            Ok(()) => {
                report.write_count += processed_items.len();
                Self::manage_error(writer.flush());
            }
            Err(error) => {
                warn!("Error writing items: {}", error);
                report.write_error_count += processed_items.len();

                if Self::is_skip_limit_reached(errors, processed_items.len(), skip_limit) {
                    report.failure = Some(StepStatus::WriteError);
                }
            }
        }

        report
    }

    /// Records `count` new errors and tells whether the skip limit is now exceeded.
    fn is_skip_limit_reached(errors: &AtomicUsize, count: usize, skip_limit: usize) -> bool {
        errors.fetch_add(count, Ordering::SeqCst) + count > skip_limit
    }

    fn manage_error(result: Result<(), BatchError>) {
        if let Err(error) = result {
            warn!("Non-fatal error: {}", error);
        }
    }
}

pub struct ChunkOrientedStepBuilder<'a, I, O> {
    name: String,
    reader: Option<&'a dyn ItemReader<I>>,
    processor: Option<&'a (dyn ItemProcessor<I, O> + Sync)>,
    writer: Option<&'a (dyn ItemWriter<O> + Sync)>,
    chunk_size: usize,
    skip_limit: usize,
    concurrency_limit: usize,
}

impl<'a, I, O> ChunkOrientedStepBuilder<'a, I, O> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reader: None,
            processor: None,
            writer: None,
            chunk_size: 10,
            skip_limit: 0,
            concurrency_limit: 1,
        }
    }

    /// Sets the item reader of the step.
    ///
    /// # Arguments
    ///
    /// * `reader` - Source of the items, always read on the thread running the step
    ///
    /// # Returns
    ///
    /// The updated builder.
    pub fn reader(mut self, reader: &'a dyn ItemReader<I>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Sets the item processor of the step.
    ///
    /// # Arguments
    ///
    /// * `processor` - Transforms each item; returning `Ok(None)` filters it out.
    ///   Shared between chunk workers, hence `Sync`.
    ///
    /// # Returns
    ///
    /// The updated builder.
    pub fn processor(mut self, processor: &'a (dyn ItemProcessor<I, O> + Sync)) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Sets the item writer of the step.
    ///
    /// # Arguments
    ///
    /// * `writer` - Receives each chunk of processed items in a single call.
    ///   Shared between chunk workers, hence `Sync`.
    ///
    /// # Returns
    ///
    /// The updated builder.
    pub fn writer(mut self, writer: &'a (dyn ItemWriter<O> + Sync)) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Sets the commit interval. Values below one are raised to one.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets how many read, process or write errors the step tolerates
    /// before failing. Defaults to zero.
    pub fn skip_limit(mut self, skip_limit: usize) -> Self {
        self.skip_limit = skip_limit;
        self
    }

    /// Sets how many chunks may be processed and written at the same time.
    /// Values below one are raised to one.
    pub fn concurrency_limit(mut self, concurrency_limit: usize) -> Self {
        self.concurrency_limit = concurrency_limit.max(1);
        self
    }

    /// Builds the step.
    ///
    /// # Panics
    ///
    /// Panics if the reader, the processor or the writer was not set.
    pub fn build(self) -> ChunkOrientedStep<'a, I, O> {
        ChunkOrientedStep {
            name: self.name,
            reader: self.reader.expect("Reader is required for building a step"),
            processor: self
                .processor
                .expect("Processor is required for building a step"),
            writer: self.writer.expect("Writer is required for building a step"),
            chunk_size: self.chunk_size,
            skip_limit: self.skip_limit,
            concurrency_limit: self.concurrency_limit,
        }
    }
}

pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    /// Creates a step builder. An empty name is replaced by a random one.
    pub fn new(name: &str) -> Self {
        let name = if name.is_empty() {
            build_name()
        } else {
            name.to_string()
        };
        Self { name }
    }

    pub fn chunk<'a, I, O>(self, chunk_size: usize) -> ChunkOrientedStepBuilder<'a, I, O> {
        ChunkOrientedStepBuilder::new(&self.name).chunk_size(chunk_size)
    }
}
