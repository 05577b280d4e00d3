//! Error types for Batchline

use thiserror::Error;

/// Result type alias for Batchline operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Main error type for Batchline
///
/// Per-record errors (`MalformedInput`) are resolved by the configured
/// skip-or-abort policy. Configuration errors (`SchemaMismatch`, `Config`)
/// are fatal before any run begins. Chunk-level errors end the run as
/// failed with the cause preserved.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input at record {record}: expected {expected} fields, found {found}")]
    MalformedInput {
        record: u64,
        expected: usize,
        found: usize,
    },

    #[error("schema mismatch: unknown target field '{field}'")]
    SchemaMismatch { field: String },

    #[error("chunk write failed at record {position}: {source}")]
    ChunkWrite {
        /// Zero-based position of the failing record within the chunk.
        position: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("job '{job_name}' already has a running execution")]
    DuplicateRun { job_name: String },

    #[error("job '{job_name}' was cancelled before the next chunk")]
    Cancelled { job_name: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),
}

impl BatchError {
    /// Wrap a writer failure with the failing record's position in the chunk.
    pub fn chunk_write<E>(position: usize, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BatchError::ChunkWrite {
            position,
            source: Box::new(source),
        }
    }
}
