//! Pipeline configuration types
//!
//! Configuration for the flat-file input and the insert target. These are
//! plain serde structs so the binary can layer a config file with
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use batchline_common::{BatchError, Result};

/// Default chunk size when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default input field delimiter.
pub const DEFAULT_DELIMITER: &str = ",";

/// Policy for records that violate the input schema.
///
/// Applies to per-record read failures only; chunk-level and
/// configuration-level errors always end the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Abort the run on the first malformed record (default)
    #[default]
    Abort,
    /// Count the record as skipped and continue with the next one
    Skip,
}

/// Flat-file input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatFileConfig {
    /// Path to the delimited text source
    pub path: PathBuf,
    /// Field delimiter; must be a single ASCII character
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Whether the first line is a header row to skip
    #[serde(default)]
    pub has_headers: bool,
    /// Ordered field names, one per delimited column
    pub field_names: Vec<String>,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

impl FlatFileConfig {
    /// The delimiter as a single byte, validated
    pub fn delimiter_byte(&self) -> Result<u8> {
        let bytes = self.delimiter.as_bytes();
        if bytes.len() != 1 {
            return Err(BatchError::Config(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        Ok(bytes[0])
    }

    /// Validate the schema: at least one uniquely named field
    pub fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;

        if self.field_names.is_empty() {
            return Err(BatchError::Config(
                "input schema must name at least one field".to_string(),
            ));
        }

        for (i, name) in self.field_names.iter().enumerate() {
            if self.field_names[..i].contains(name) {
                return Err(BatchError::Config(format!(
                    "duplicate field name '{}' in input schema",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// One field -> column mapping entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Domain record field name
    pub field: String,
    /// Persisted column name
    pub column: String,
}

/// Insert target: the table and the ordered field -> column mapping,
/// fixed at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertTarget {
    pub table: String,
    pub columns: Vec<ColumnMapping>,
}

/// Reject names that cannot be used verbatim in a statement.
///
/// Table and column names are interpolated into the insert statement, so
/// they are restricted to identifier characters. Values always go through
/// bind parameters.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        },
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(BatchError::Config(format!(
            "'{}' is not a valid SQL identifier",
            name
        )))
    }
}
