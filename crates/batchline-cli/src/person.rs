//! The person import job
//!
//! The concrete domain wired into the generic pipeline: a person with a
//! first and last name, read positionally from the configured input
//! schema, optionally uppercased, and inserted into the `people` table.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use batchline_common::{BatchError, Result};
use batchline_core::{
    orchestrator::{BatchJob, BatchJobBuilder, RunRegistry},
    processor::{ItemProcessor, PassthroughProcessor},
    record::{FieldAccess, RawRecord},
    writer::ChunkWriter,
    RecordMapper,
};

use crate::config::{JobSettings, Transform};

/// A person record: created by the mapper, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
}

impl FieldAccess for Person {
    fn field_names() -> &'static [&'static str] {
        &["first_name", "last_name"]
    }

    fn field(&self, name: &str) -> Option<String> {
        match name {
            "first_name" => Some(self.first_name.clone()),
            "last_name" => Some(self.last_name.clone()),
            _ => None,
        }
    }
}

/// Maps a raw record into a [`Person`] by position.
///
/// Field positions are resolved from the configured field-name list when
/// the mapper is built, so a schema that names unknown fields fails at
/// configuration time rather than per record.
#[derive(Debug)]
pub struct PersonMapper {
    first_name_pos: usize,
    last_name_pos: usize,
}

impl PersonMapper {
    pub fn new(field_names: &[String]) -> Result<Self> {
        for name in field_names {
            if !Person::field_names().contains(&name.as_str()) {
                return Err(BatchError::SchemaMismatch { field: name.clone() });
            }
        }

        Ok(Self {
            first_name_pos: Self::position(field_names, "first_name")?,
            last_name_pos: Self::position(field_names, "last_name")?,
        })
    }

    fn position(field_names: &[String], field: &str) -> Result<usize> {
        field_names
            .iter()
            .position(|name| name == field)
            .ok_or_else(|| {
                BatchError::Config(format!("input schema does not provide field '{field}'"))
            })
    }
}

impl RecordMapper<Person> for PersonMapper {
    fn map(&self, raw: &RawRecord) -> Result<Person> {
        let field = |pos: usize| {
            raw.field(pos).map(str::to_string).ok_or_else(|| {
                BatchError::Parse(format!(
                    "record {} has no field at position {pos}",
                    raw.record_number
                ))
            })
        };

        Ok(Person {
            first_name: field(self.first_name_pos)?,
            last_name: field(self.last_name_pos)?,
        })
    }
}

/// Uppercases both names, as the original import job did.
#[derive(Debug, Clone, Copy, Default)]
pub struct UppercasePersonProcessor;

impl ItemProcessor<Person, Person> for UppercasePersonProcessor {
    fn process(&self, person: Person) -> Result<Option<Person>> {
        let transformed = Person {
            first_name: person.first_name.to_uppercase(),
            last_name: person.last_name.to_uppercase(),
        };

        debug!(
            from = %format!("{} {}", person.first_name, person.last_name),
            to = %format!("{} {}", transformed.first_name, transformed.last_name),
            "Converted person"
        );

        Ok(Some(transformed))
    }
}

/// Assemble the person import job from its settings and a chunk writer.
pub fn build_job(
    settings: &JobSettings,
    writer: Box<dyn ChunkWriter<Person>>,
    registry: Arc<RunRegistry>,
) -> Result<BatchJob<Person, Person>> {
    let mapper = PersonMapper::new(&settings.input.field_names)?;

    let builder = BatchJobBuilder::new(settings.name.clone())
        .chunk_size(settings.chunk_size)
        .on_malformed(settings.on_malformed)
        .mapper(mapper)
        .boxed_writer(writer)
        .registry(registry);

    match settings.transform {
        Transform::None => builder.processor(PassthroughProcessor).build(),
        Transform::Uppercase => builder.processor(UppercasePersonProcessor).build(),
    }
}
