//! Batchline Core Library
//!
//! A generic chunked batch import pipeline: read raw records from a
//! delimited text source, map them into typed values, transform them, and
//! persist them in fixed-size transactional chunks.
//!
//! Data flows reader -> mapper -> processor -> chunk buffer -> writer; the
//! [`BatchJob`] orchestrator owns the loop and the commit boundaries, and a
//! [`JobListener`] observes each run without being able to alter its
//! outcome.
//!
//! # Example
//!
//! ```no_run
//! use batchline_core::{
//!     orchestrator::{BatchJobBuilder, RunRegistry},
//!     processor::PassthroughProcessor,
//!     reader::FlatFileReader,
//!     record::RawRecord,
//!     writer::MemoryChunkWriter,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> batchline_common::Result<()> {
//!     let config = batchline_core::config::FlatFileConfig {
//!         path: "data/sample-people.csv".into(),
//!         delimiter: ",".into(),
//!         has_headers: false,
//!         field_names: vec!["first_name".into(), "last_name".into()],
//!     };
//!
//!     let job = BatchJobBuilder::new("import-people")
//!         .chunk_size(2)
//!         .mapper(|raw: &RawRecord| -> batchline_common::Result<Vec<String>> {
//!             Ok(raw.fields.clone())
//!         })
//!         .processor(PassthroughProcessor)
//!         .writer(MemoryChunkWriter::new())
//!         .registry(Arc::new(RunRegistry::new()))
//!         .build()?;
//!
//!     let mut reader = FlatFileReader::open(&config)?;
//!     let execution = job.run(&mut reader).await?;
//!     println!("{}: {} written", execution.status, execution.written_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod execution;
pub mod listener;
pub mod mapper;
pub mod orchestrator;
pub mod processor;
pub mod reader;
pub mod record;
pub mod scheduler;
pub mod writer;

// Re-export the types most integrations need
pub use config::{FlatFileConfig, InsertTarget, MalformedPolicy};
pub use execution::{JobExecution, JobStatus};
pub use listener::{JobListener, LogCompletionListener};
pub use mapper::RecordMapper;
pub use orchestrator::{BatchJob, BatchJobBuilder, CancelHandle, RunRegistry};
pub use processor::{ItemProcessor, PassthroughProcessor};
pub use reader::{FlatFileReader, RecordReader};
pub use record::{FieldAccess, RawRecord};
pub use scheduler::FixedRateSchedule;
pub use writer::{ChunkWriter, MemoryChunkWriter, PgChunkWriter};
