//! Record processor: pure transformation between pipeline stages

use batchline_common::Result;

/// Transforms a mapped value into the value that gets written.
///
/// `Ok(None)` is the skip signal: the record is dropped from the current
/// chunk and counted as skipped, without aborting the run. Processing must
/// be deterministic and side-effect free.
pub trait ItemProcessor<I, O>: Send + Sync {
    fn process(&self, item: I) -> Result<Option<O>>;
}

/// The identity processor: output equals input, never skips.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

impl<T: Send> ItemProcessor<T, T> for PassthroughProcessor {
    fn process(&self, item: T) -> Result<Option<T>> {
        Ok(Some(item))
    }
}
