//! Record reader for delimited text sources
//!
//! Reading is strictly sequential and forward-only. A source is restartable
//! by opening a fresh reader; a closed reader cannot be resumed mid-stream.

use std::fs::File;
use std::io::Read;

use batchline_common::{BatchError, Result};

use crate::config::FlatFileConfig;
use crate::record::RawRecord;

/// Produces a lazy, finite sequence of raw records.
///
/// `Ok(None)` signals end of input. A `MalformedInput` error consumes the
/// offending record and leaves the reader positioned at the next one, so a
/// skip policy can keep going.
pub trait RecordReader: Send {
    fn next_record(&mut self) -> Result<Option<RawRecord>>;
}

/// Reader for line-delimited text with a configurable field delimiter.
///
/// The configured field-name list defines the expected column count; any
/// record with a different field count is malformed.
pub struct FlatFileReader<R: Read> {
    reader: csv::Reader<R>,
    expected_fields: usize,
    record_number: u64,
}

impl FlatFileReader<File> {
    /// Open the configured source file from the beginning.
    pub fn open(config: &FlatFileConfig) -> Result<Self> {
        let file = File::open(&config.path)?;
        Self::from_reader(file, config)
    }
}

impl<R: Read> FlatFileReader<R> {
    /// Build a reader over any byte source, e.g. an in-memory buffer.
    pub fn from_reader(source: R, config: &FlatFileConfig) -> Result<Self> {
        config.validate()?;

        let reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter_byte()?)
            .has_headers(config.has_headers)
            // Field counts are checked against the schema here, not by csv
            .flexible(true)
            .from_reader(source);

        Ok(Self {
            reader,
            expected_fields: config.field_names.len(),
            record_number: 0,
        })
    }
}

impl<R: Read + Send> RecordReader for FlatFileReader<R> {
    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let mut record = csv::StringRecord::new();

        let more = self
            .reader
            .read_record(&mut record)
            .map_err(|e| BatchError::Parse(e.to_string()))?;

        if !more {
            return Ok(None);
        }

        self.record_number += 1;

        if record.len() != self.expected_fields {
            return Err(BatchError::MalformedInput {
                record: self.record_number,
                expected: self.expected_fields,
                found: record.len(),
            });
        }

        Ok(Some(RawRecord::new(
            record.iter().map(str::to_string).collect(),
            self.record_number,
        )))
    }
}
