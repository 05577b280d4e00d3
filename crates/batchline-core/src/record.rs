//! Record types flowing through the pipeline

/// One raw input record: the ordered string fields parsed from a single
/// line, plus the 1-based number of the record in the source.
///
/// A raw record has no identity beyond its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Field values in source column order
    pub fields: Vec<String>,
    /// 1-based record number within the source (headers excluded)
    pub record_number: u64,
}

impl RawRecord {
    pub fn new(fields: Vec<String>, record_number: u64) -> Self {
        Self {
            fields,
            record_number,
        }
    }

    /// Field value at a position, if present
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Field-level access to a domain record.
///
/// Writers use this to resolve a configured field -> column mapping against
/// a concrete record type at configuration time, and to pull per-record
/// values at write time.
pub trait FieldAccess {
    /// Names of all fields this record type exposes
    fn field_names() -> &'static [&'static str];

    /// Value of one field by name; `None` for unknown names
    fn field(&self, name: &str) -> Option<String>;
}
