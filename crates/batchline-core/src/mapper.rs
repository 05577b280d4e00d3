//! Record mapper: raw record in, typed domain value out

use batchline_common::Result;

use crate::record::RawRecord;

/// Parses one raw record into a typed domain value.
///
/// Mapping must be a pure function of the record: mapping the same raw
/// record twice yields equal values. Positional field resolution against
/// the configured schema belongs in the mapper's constructor, so that an
/// invalid mapping fails at configuration time rather than per record.
pub trait RecordMapper<T>: Send + Sync {
    fn map(&self, raw: &RawRecord) -> Result<T>;
}

/// Any pure closure can serve as a mapper.
impl<T, F> RecordMapper<T> for F
where
    F: Fn(&RawRecord) -> Result<T> + Send + Sync,
{
    fn map(&self, raw: &RawRecord) -> Result<T> {
        self(raw)
    }
}
