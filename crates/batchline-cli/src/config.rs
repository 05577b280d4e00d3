//! Application configuration
//!
//! Loaded from a TOML file layered with `BATCHLINE_*` environment
//! variables (double underscore as the nesting separator, e.g.
//! `BATCHLINE_DATABASE__URL`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use batchline_core::config::{FlatFileConfig, InsertTarget, MalformedPolicy, DEFAULT_CHUNK_SIZE};

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/batchline";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default schedule period in seconds, matching the import job's
/// historical 50-second fixed rate.
pub const DEFAULT_SCHEDULE_PERIOD_SECS: u64 = 50;

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub job: JobSettings,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Settings for the person import job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// Logical job name; at most one execution per name runs at a time
    #[serde(default = "default_job_name")]
    pub name: String,
    /// Records per transactional chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// What to do with records that violate the input schema
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
    /// Transformation applied between mapping and writing
    #[serde(default)]
    pub transform: Transform,
    /// Flat-file input settings
    pub input: FlatFileConfig,
    /// Table and field -> column mapping for inserts
    pub target: InsertTarget,
}

/// The processor to run between mapper and writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Pass records through unchanged
    #[default]
    None,
    /// Uppercase both name fields
    Uppercase,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Fixed-rate schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_period")]
    pub period_secs: u64,
}

fn default_job_name() -> String {
    "import-people".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_min_connections() -> u32 {
    DEFAULT_DATABASE_MIN_CONNECTIONS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS
}

fn default_schedule_period() -> u64 {
    DEFAULT_SCHEDULE_PERIOD_SECS
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period_secs: default_schedule_period(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file overlaid with environment
    /// variables.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("BATCHLINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.job.input.validate()?;
        Ok(app)
    }
}
