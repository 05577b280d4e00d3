//! Job execution state
//!
//! One `JobExecution` per pipeline run. The orchestrator is the only
//! mutator; the record is retained for reporting after the run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Job run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    /// Unique per invocation, derived from the invocation timestamp, so
    /// repeated scheduled runs of the same job never collide
    pub run_id: i64,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Records read from the source, malformed ones included
    pub read_count: u64,
    /// Records committed by the writer
    pub written_count: u64,
    /// Records skipped by the processor or the malformed-input policy
    pub skipped_count: u64,
    /// Failure cause for failed runs
    pub exit_message: Option<String>,
}

impl JobExecution {
    /// Start a new execution in the `Running` state with a fresh run id.
    pub fn start(job_name: &str) -> Self {
        let started_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            run_id: started_at.timestamp_millis(),
            status: JobStatus::Running,
            started_at,
            completed_at: None,
            read_count: 0,
            written_count: 0,
            skipped_count: 0,
            exit_message: None,
        }
    }

    /// Transition to `Completed`. Ignored from a terminal state.
    pub fn complete(&mut self) {
        self.finish(JobStatus::Completed, None);
    }

    /// Transition to `Failed`, preserving the cause. Ignored from a
    /// terminal state.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.finish(JobStatus::Failed, Some(message.into()));
    }

    fn finish(&mut self, status: JobStatus, message: Option<String>) {
        if self.status.is_terminal() {
            warn!(
                job = %self.job_name,
                current = %self.status,
                attempted = %status,
                "Ignoring status transition out of a terminal state"
            );
            return;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        self.exit_message = message;
    }

    /// Wall-clock duration of the run so far, or of the whole run once
    /// terminal.
    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Records read but neither written nor skipped; non-zero only for
    /// aborted runs.
    pub fn aborted_remainder(&self) -> u64 {
        self.read_count
            .saturating_sub(self.written_count + self.skipped_count)
    }
}
