//! Chunk writers
//!
//! A chunk is persisted as one atomic unit: either every record in it is
//! committed or none are. The Postgres writer runs the whole chunk inside
//! a single transaction; a failure anywhere rolls it back and reports the
//! failing record's position.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use batchline_common::{BatchError, Result};

use crate::config::{validate_identifier, InsertTarget};
use crate::record::FieldAccess;

/// Persists one batch of processed records as a single transactional unit.
#[async_trait]
pub trait ChunkWriter<T>: Send + Sync {
    async fn write_chunk(&self, chunk: &[T]) -> Result<()>;
}

/// Writer that inserts each record of a chunk into a Postgres table,
/// one transaction per chunk.
///
/// The field -> column mapping is validated against `T`'s fields when the
/// writer is built, so a bad mapping fails at configuration time.
#[derive(Debug)]
pub struct PgChunkWriter<T> {
    pool: PgPool,
    statement: String,
    /// Field names in statement placeholder order
    fields: Vec<String>,
    _record: PhantomData<fn() -> T>,
}

impl<T: FieldAccess> PgChunkWriter<T> {
    pub fn new(pool: PgPool, target: &InsertTarget) -> Result<Self> {
        if target.columns.is_empty() {
            return Err(BatchError::Config(
                "insert target must map at least one column".to_string(),
            ));
        }

        validate_identifier(&target.table)?;
        for mapping in &target.columns {
            validate_identifier(&mapping.column)?;
            if !T::field_names().contains(&mapping.field.as_str()) {
                return Err(BatchError::SchemaMismatch {
                    field: mapping.field.clone(),
                });
            }
        }

        let columns: Vec<&str> = target.columns.iter().map(|m| m.column.as_str()).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target.table,
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(Self {
            pool,
            statement,
            fields: target.columns.iter().map(|m| m.field.clone()).collect(),
            _record: PhantomData,
        })
    }

    /// The prepared insert statement text
    pub fn statement(&self) -> &str {
        &self.statement
    }
}

#[async_trait]
impl<T> ChunkWriter<T> for PgChunkWriter<T>
where
    T: FieldAccess + Send + Sync,
{
    async fn write_chunk(&self, chunk: &[T]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BatchError::Database(e.to_string()))?;

        for (position, item) in chunk.iter().enumerate() {
            let mut insert = sqlx::query(&self.statement);
            for field in &self.fields {
                let value = item.field(field).ok_or_else(|| BatchError::SchemaMismatch {
                    field: field.clone(),
                })?;
                insert = insert.bind(value);
            }

            insert
                .execute(&mut *tx)
                .await
                .map_err(|e| BatchError::chunk_write(position, e))?;
        }

        // Dropping the transaction without this rolls the chunk back
        tx.commit()
            .await
            .map_err(|e| BatchError::Database(e.to_string()))?;

        debug!(records = chunk.len(), "Chunk committed");
        Ok(())
    }
}

/// Shared writers can be handed to a job by reference count.
#[async_trait]
impl<T, W> ChunkWriter<T> for Arc<W>
where
    T: Sync,
    W: ChunkWriter<T> + ?Sized,
{
    async fn write_chunk(&self, chunk: &[T]) -> Result<()> {
        (**self).write_chunk(chunk).await
    }
}

/// In-memory writer that records every committed chunk.
///
/// Useful for tests and dry runs; the chunk history doubles as a record of
/// commit boundaries.
#[derive(Debug, Default)]
pub struct MemoryChunkWriter<T> {
    chunks: Mutex<Vec<Vec<T>>>,
}

impl<T: Clone> MemoryChunkWriter<T> {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
        }
    }

    /// All committed chunks, in commit order
    pub fn chunks(&self) -> Vec<Vec<T>> {
        match self.chunks.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// All committed records, flattened in commit order
    pub fn records(&self) -> Vec<T> {
        self.chunks().into_iter().flatten().collect()
    }
}

#[async_trait]
impl<T> ChunkWriter<T> for MemoryChunkWriter<T>
where
    T: Clone + Send + Sync,
{
    async fn write_chunk(&self, chunk: &[T]) -> Result<()> {
        match self.chunks.lock() {
            Ok(mut guard) => guard.push(chunk.to_vec()),
            Err(poisoned) => poisoned.into_inner().push(chunk.to_vec()),
        }
        Ok(())
    }
}
