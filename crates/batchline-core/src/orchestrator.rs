//! Job orchestrator
//!
//! Drives the read -> map -> process -> buffer -> write loop, enforces the
//! chunk size and the per-chunk commit boundary, and reports the final
//! status. Within a run the loop is single threaded and strictly ordered,
//! so output insertion order equals input read order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use batchline_common::{BatchError, Result};

use crate::config::{MalformedPolicy, DEFAULT_CHUNK_SIZE};
use crate::execution::JobExecution;
use crate::listener::{JobListener, LogCompletionListener};
use crate::mapper::RecordMapper;
use crate::processor::ItemProcessor;
use crate::reader::RecordReader;
use crate::writer::ChunkWriter;

/// Tracks which job names currently have a running execution.
///
/// Shared between every job definition that must honor the
/// at-most-one-concurrent-execution invariant; overlapping invocations of
/// the same name are rejected without touching the prior run.
#[derive(Debug, Default)]
pub struct RunRegistry {
    running: Mutex<HashSet<String>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a job name as running, or reject a duplicate.
    pub fn try_acquire(self: &Arc<Self>, job_name: &str) -> Result<RunGuard> {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !running.insert(job_name.to_string()) {
            return Err(BatchError::DuplicateRun {
                job_name: job_name.to_string(),
            });
        }

        Ok(RunGuard {
            registry: Arc::clone(self),
            job_name: job_name.to_string(),
        })
    }

    fn release(&self, job_name: &str) {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        running.remove(job_name);
    }
}

/// Releases the job name when the run ends, on every exit path.
pub struct RunGuard {
    registry: Arc<RunRegistry>,
    job_name: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.release(&self.job_name);
    }
}

/// Advisory cancellation handle.
///
/// Checked between chunks only; a run that is cancelled stops before its
/// next commit and leaves already-committed chunks intact.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A configured batch job: the orchestrator over one reader/mapper/
/// processor/writer assembly.
///
/// `I` is the mapped domain type, `O` the processed type that gets written.
pub struct BatchJob<I, O> {
    name: String,
    chunk_size: usize,
    on_malformed: MalformedPolicy,
    mapper: Box<dyn RecordMapper<I>>,
    processor: Box<dyn ItemProcessor<I, O>>,
    writer: Box<dyn ChunkWriter<O>>,
    listener: Box<dyn JobListener>,
    registry: Arc<RunRegistry>,
    cancel: CancelHandle,
}

impl<I, O: Send> BatchJob<I, O> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle for requesting advisory cancellation of in-flight runs.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Execute one run against a freshly opened reader.
    ///
    /// Returns `DuplicateRun` without starting anything when an execution
    /// with the same job name is already running. Otherwise always returns
    /// the finished execution: a failed run is an `Ok` value whose status
    /// is `Failed` and whose `exit_message` preserves the cause.
    pub async fn run(&self, reader: &mut dyn RecordReader) -> Result<JobExecution> {
        let _guard = self.registry.try_acquire(&self.name)?;

        let mut execution = JobExecution::start(&self.name);
        debug!(job = %self.name, run_id = execution.run_id, chunk_size = self.chunk_size, "Run starting");

        if let Err(e) = self.listener.before_job(&execution) {
            warn!(job = %self.name, error = %e, "Listener failed in before_job");
        }

        let mut buffer: Vec<O> = Vec::with_capacity(self.chunk_size);
        match self.drive(reader, &mut execution, &mut buffer).await {
            Ok(()) => execution.complete(),
            Err(e) => execution.fail(e.to_string()),
        }

        // Exactly once per run, regardless of outcome
        if let Err(e) = self.listener.after_job(&execution) {
            warn!(job = %self.name, error = %e, "Listener failed in after_job");
        }

        Ok(execution)
    }

    /// The read -> map -> process -> buffer -> write loop.
    async fn drive(
        &self,
        reader: &mut dyn RecordReader,
        execution: &mut JobExecution,
        buffer: &mut Vec<O>,
    ) -> Result<()> {
        loop {
            let raw = match reader.next_record() {
                Ok(Some(raw)) => {
                    execution.read_count += 1;
                    raw
                },
                Ok(None) => break,
                Err(e @ BatchError::MalformedInput { .. }) => {
                    execution.read_count += 1;
                    match self.on_malformed {
                        MalformedPolicy::Abort => return Err(e),
                        MalformedPolicy::Skip => {
                            warn!(job = %self.name, error = %e, "Skipping malformed record");
                            execution.skipped_count += 1;
                            continue;
                        },
                    }
                },
                Err(e) => return Err(e),
            };

            let item = self.mapper.map(&raw)?;

            match self.processor.process(item)? {
                Some(processed) => buffer.push(processed),
                None => {
                    execution.skipped_count += 1;
                    continue;
                },
            }

            if buffer.len() >= self.chunk_size {
                self.flush(execution, buffer).await?;
            }
        }

        // Final partial chunk follows the same success/failure rule
        if !buffer.is_empty() {
            self.flush(execution, buffer).await?;
        }

        Ok(())
    }

    /// Commit the buffered chunk as one transactional unit.
    async fn flush(&self, execution: &mut JobExecution, buffer: &mut Vec<O>) -> Result<()> {
        // Advisory cancellation point: only ever between chunks
        if self.cancel.is_cancelled() {
            return Err(BatchError::Cancelled {
                job_name: self.name.clone(),
            });
        }

        self.writer.write_chunk(buffer).await?;
        execution.written_count += buffer.len() as u64;
        buffer.clear();
        Ok(())
    }
}

/// Builder assembling the chosen implementation of each component's
/// interface into a [`BatchJob`], once, at startup.
pub struct BatchJobBuilder<I, O> {
    name: String,
    chunk_size: usize,
    on_malformed: MalformedPolicy,
    mapper: Option<Box<dyn RecordMapper<I>>>,
    processor: Option<Box<dyn ItemProcessor<I, O>>>,
    writer: Option<Box<dyn ChunkWriter<O>>>,
    listener: Box<dyn JobListener>,
    registry: Option<Arc<RunRegistry>>,
    cancel: CancelHandle,
}

impl<I, O> BatchJobBuilder<I, O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            on_malformed: MalformedPolicy::default(),
            mapper: None,
            processor: None,
            writer: None,
            listener: Box::new(LogCompletionListener),
            registry: None,
            cancel: CancelHandle::new(),
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    pub fn mapper(mut self, mapper: impl RecordMapper<I> + 'static) -> Self {
        self.mapper = Some(Box::new(mapper));
        self
    }

    pub fn processor(mut self, processor: impl ItemProcessor<I, O> + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    pub fn writer(mut self, writer: impl ChunkWriter<O> + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn boxed_writer(mut self, writer: Box<dyn ChunkWriter<O>>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn listener(mut self, listener: impl JobListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    pub fn registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Result<BatchJob<I, O>> {
        if self.name.is_empty() {
            return Err(BatchError::Config("job name must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(BatchError::Config(
                "chunk size must be at least 1".to_string(),
            ));
        }

        let mapper = self
            .mapper
            .ok_or_else(|| BatchError::Config("job has no record mapper".to_string()))?;
        let processor = self
            .processor
            .ok_or_else(|| BatchError::Config("job has no item processor".to_string()))?;
        let writer = self
            .writer
            .ok_or_else(|| BatchError::Config("job has no chunk writer".to_string()))?;

        info!(
            job = %self.name,
            chunk_size = self.chunk_size,
            on_malformed = ?self.on_malformed,
            "Batch job assembled"
        );

        Ok(BatchJob {
            name: self.name,
            chunk_size: self.chunk_size,
            on_malformed: self.on_malformed,
            mapper,
            processor,
            writer,
            listener: self.listener,
            registry: self.registry.unwrap_or_default(),
            cancel: self.cancel,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::config::FlatFileConfig;
    use crate::execution::JobStatus;
    use crate::processor::PassthroughProcessor;
    use crate::reader::FlatFileReader;
    use crate::record::RawRecord;
    use crate::writer::MemoryChunkWriter;

    type Row = Vec<String>;

    fn two_column_config() -> FlatFileConfig {
        FlatFileConfig {
            path: PathBuf::from("unused"),
            delimiter: ",".to_string(),
            has_headers: false,
            field_names: vec!["first_name".to_string(), "last_name".to_string()],
        }
    }

    fn reader_over(input: &str) -> FlatFileReader<Cursor<Vec<u8>>> {
        FlatFileReader::from_reader(Cursor::new(input.as_bytes().to_vec()), &two_column_config())
            .unwrap()
    }

    fn raw_mapper(raw: &RawRecord) -> Result<Row> {
        Ok(raw.fields.clone())
    }

    /// Counts listener invocations per hook.
    #[derive(Default)]
    struct CountingListener {
        before: AtomicUsize,
        after: AtomicUsize,
    }

    impl JobListener for Arc<CountingListener> {
        fn before_job(&self, _execution: &JobExecution) -> Result<()> {
            self.before.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn after_job(&self, _execution: &JobExecution) -> Result<()> {
            self.after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails every chunk after the first with a mid-chunk error.
    struct FailingWriter {
        inner: Arc<MemoryChunkWriter<Row>>,
        committed: AtomicUsize,
    }

    #[async_trait]
    impl ChunkWriter<Row> for FailingWriter {
        async fn write_chunk(&self, chunk: &[Row]) -> Result<()> {
            if self.committed.fetch_add(1, Ordering::SeqCst) >= 1 {
                return Err(BatchError::chunk_write(
                    1,
                    std::io::Error::new(std::io::ErrorKind::Other, "unique violation"),
                ));
            }
            self.inner.write_chunk(chunk).await
        }
    }

    /// Blocks inside the first write until released, to hold a run open.
    struct BlockingWriter {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        inner: Arc<MemoryChunkWriter<Row>>,
    }

    #[async_trait]
    impl ChunkWriter<Row> for BlockingWriter {
        async fn write_chunk(&self, chunk: &[Row]) -> Result<()> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.write_chunk(chunk).await
        }
    }

    fn job_with_writer(
        chunk_size: usize,
        writer: impl ChunkWriter<Row> + 'static,
    ) -> BatchJob<Row, Row> {
        BatchJobBuilder::new("import-people")
            .chunk_size(chunk_size)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(writer)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_chunk_of_two_then_one() {
        let store = Arc::new(MemoryChunkWriter::new());
        let job = job_with_writer(2, Arc::clone(&store));

        let mut reader = reader_over("Jill,Doe\nJoe,Doe\nJustin,Doe");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.status, JobStatus::Completed);
        assert_eq!(execution.read_count, 3);
        assert_eq!(execution.written_count, 3);
        assert_eq!(execution.skipped_count, 0);

        // Two transactional writes: a chunk of 2, then a chunk of 1
        let chunks = store.chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[1].len(), 1);
    }

    #[tokio::test]
    async fn test_output_order_equals_input_order() {
        let store = Arc::new(MemoryChunkWriter::new());
        let job = job_with_writer(2, Arc::clone(&store));

        let mut reader = reader_over("a,1\nb,2\nc,3\nd,4\ne,5");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.written_count, 5);
        let firsts: Vec<String> = store.records().into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(firsts, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_counts_reconcile_for_various_chunk_sizes() {
        for chunk_size in [1, 2, 3, 7] {
            let store = Arc::new(MemoryChunkWriter::new());
            let job = job_with_writer(chunk_size, Arc::clone(&store));

            let mut reader = reader_over("a,1\nb,2\nc,3\nd,4\ne,5");
            let execution = job.run(&mut reader).await.unwrap();

            assert_eq!(execution.status, JobStatus::Completed);
            assert_eq!(
                execution.written_count + execution.skipped_count,
                execution.read_count,
                "chunk size {chunk_size}"
            );
            assert_eq!(store.records().len(), 5);
        }
    }

    #[tokio::test]
    async fn test_processor_skip_counts_and_continues() {
        struct SkipB;

        impl ItemProcessor<Row, Row> for SkipB {
            fn process(&self, item: Row) -> Result<Option<Row>> {
                if item[0] == "b" {
                    Ok(None)
                } else {
                    Ok(Some(item))
                }
            }
        }

        let store = Arc::new(MemoryChunkWriter::new());
        let job = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .mapper(raw_mapper)
            .processor(SkipB)
            .writer(Arc::clone(&store))
            .build()
            .unwrap();

        let mut reader = reader_over("a,1\nb,2\nc,3");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.status, JobStatus::Completed);
        assert_eq!(execution.read_count, 3);
        assert_eq!(execution.written_count, 2);
        assert_eq!(execution.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_malformed_input_aborts_by_default() {
        let listener = Arc::new(CountingListener::default());
        let store = Arc::new(MemoryChunkWriter::new());
        let job = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(Arc::clone(&store))
            .listener(Arc::clone(&listener))
            .build()
            .unwrap();

        let mut reader = reader_over("Jill,Doe\nOnlyOneField\nJoe,Doe");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.status, JobStatus::Failed);
        assert_eq!(execution.read_count, 2);
        assert_eq!(execution.written_count, 0);
        assert!(execution
            .exit_message
            .as_deref()
            .unwrap()
            .contains("malformed input at record 2"));
        assert_eq!(execution.aborted_remainder(), 2);

        // The after-run hook still fires exactly once
        assert_eq!(listener.before.load(Ordering::SeqCst), 1);
        assert_eq!(listener.after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_input_skipped_under_skip_policy() {
        let store = Arc::new(MemoryChunkWriter::new());
        let job = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .on_malformed(MalformedPolicy::Skip)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(Arc::clone(&store))
            .build()
            .unwrap();

        let mut reader = reader_over("Jill,Doe\nOnlyOneField\nJoe,Doe");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.status, JobStatus::Completed);
        assert_eq!(execution.read_count, 3);
        assert_eq!(execution.written_count, 2);
        assert_eq!(execution.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_leaves_no_partial_chunk_visible() {
        let store = Arc::new(MemoryChunkWriter::new());
        let writer = FailingWriter {
            inner: Arc::clone(&store),
            committed: AtomicUsize::new(0),
        };
        let job = job_with_writer(2, writer);

        let mut reader = reader_over("a,1\nb,2\nc,3\nd,4\ne,5");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.status, JobStatus::Failed);
        assert_eq!(execution.written_count, 2);
        assert!(execution
            .exit_message
            .as_deref()
            .unwrap()
            .contains("chunk write failed at record 1"));

        // Only the first chunk is visible; nothing from the failed one
        assert_eq!(store.chunks().len(), 1);
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_run_rejected_and_prior_run_unaffected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let store = Arc::new(MemoryChunkWriter::new());
        let registry = Arc::new(RunRegistry::new());

        let blocked_job = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(BlockingWriter {
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
                inner: Arc::clone(&store),
            })
            .registry(Arc::clone(&registry))
            .build()
            .unwrap();

        let first_run = tokio::spawn(async move {
            let mut reader = reader_over("Jill,Doe\nJoe,Doe");
            blocked_job.run(&mut reader).await
        });

        // Wait until the first run is inside its chunk write
        entered.notified().await;

        let second = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(Arc::new(MemoryChunkWriter::<Row>::new()))
            .registry(Arc::clone(&registry))
            .build()
            .unwrap();

        let mut reader = reader_over("Jane,Doe");
        let err = second.run(&mut reader).await.unwrap_err();
        assert!(matches!(err, BatchError::DuplicateRun { .. }));

        // Release the first run and confirm it finished untouched
        release.notify_one();
        let execution = first_run.await.unwrap().unwrap();
        assert_eq!(execution.status, JobStatus::Completed);
        assert_eq!(execution.written_count, 2);
        assert_eq!(store.records().len(), 2);

        // The name is free again once the run has ended
        let mut reader = reader_over("Jane,Doe");
        let store2 = Arc::new(MemoryChunkWriter::new());
        let third = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(Arc::clone(&store2))
            .registry(registry)
            .build()
            .unwrap();
        assert!(third.run(&mut reader).await.is_ok());
    }

    #[tokio::test]
    async fn test_listener_failure_does_not_alter_job_status() {
        struct FaultyListener;

        impl JobListener for FaultyListener {
            fn before_job(&self, _execution: &JobExecution) -> Result<()> {
                Err(BatchError::Parse("before hook broke".to_string()))
            }

            fn after_job(&self, _execution: &JobExecution) -> Result<()> {
                Err(BatchError::Parse("after hook broke".to_string()))
            }
        }

        let store = Arc::new(MemoryChunkWriter::new());
        let job = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(Arc::clone(&store))
            .listener(FaultyListener)
            .build()
            .unwrap();

        let mut reader = reader_over("Jill,Doe");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.status, JobStatus::Completed);
        assert_eq!(execution.written_count, 1);
    }

    #[tokio::test]
    async fn test_cancellation_between_chunks_keeps_committed_chunks() {
        /// Cancels the job after committing its first chunk.
        struct CancellingWriter {
            inner: Arc<MemoryChunkWriter<Row>>,
            cancel: CancelHandle,
        }

        #[async_trait]
        impl ChunkWriter<Row> for CancellingWriter {
            async fn write_chunk(&self, chunk: &[Row]) -> Result<()> {
                self.inner.write_chunk(chunk).await?;
                self.cancel.cancel();
                Ok(())
            }
        }

        let cancel = CancelHandle::new();
        let store = Arc::new(MemoryChunkWriter::new());
        let job = BatchJobBuilder::new("import-people")
            .chunk_size(2)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(CancellingWriter {
                inner: Arc::clone(&store),
                cancel: cancel.clone(),
            })
            .cancel_handle(cancel)
            .build()
            .unwrap();

        let mut reader = reader_over("a,1\nb,2\nc,3");
        let execution = job.run(&mut reader).await.unwrap();

        assert_eq!(execution.status, JobStatus::Failed);
        assert!(execution.exit_message.as_deref().unwrap().contains("cancelled"));
        // The committed chunk stays intact
        assert_eq!(store.chunks().len(), 1);
        assert_eq!(execution.written_count, 2);
    }

    #[test]
    fn test_builder_rejects_zero_chunk_size() {
        let result = BatchJobBuilder::<Row, Row>::new("import-people")
            .chunk_size(0)
            .mapper(raw_mapper)
            .processor(PassthroughProcessor)
            .writer(MemoryChunkWriter::new())
            .build();

        assert!(matches!(result, Err(BatchError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_missing_components() {
        let result = BatchJobBuilder::<Row, Row>::new("import-people")
            .mapper(raw_mapper)
            .build();

        assert!(matches!(result, Err(BatchError::Config(_))));
    }
}
