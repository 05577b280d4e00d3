//! Job completion listener
//!
//! Passive observers notified before and after each run. Listener failures
//! are caught and logged by the orchestrator; they can never change the
//! outcome of a run.

use tracing::{error, info};

use batchline_common::Result;

use crate::execution::{JobExecution, JobStatus};

/// Observer hooks around a job run.
///
/// Both hooks may have side effects (logging, notifications) but must not
/// influence the run: the orchestrator logs any returned error and moves on.
pub trait JobListener: Send + Sync {
    fn before_job(&self, _execution: &JobExecution) -> Result<()> {
        Ok(())
    }

    fn after_job(&self, _execution: &JobExecution) -> Result<()> {
        Ok(())
    }
}

/// Default listener: logs job start and the final status line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCompletionListener;

impl JobListener for LogCompletionListener {
    fn before_job(&self, execution: &JobExecution) -> Result<()> {
        info!(
            job = %execution.job_name,
            run_id = execution.run_id,
            "Job started"
        );
        Ok(())
    }

    fn after_job(&self, execution: &JobExecution) -> Result<()> {
        let elapsed_ms = execution.elapsed().num_milliseconds();

        match execution.status {
            JobStatus::Failed => error!(
                job = %execution.job_name,
                run_id = execution.run_id,
                read = execution.read_count,
                written = execution.written_count,
                skipped = execution.skipped_count,
                elapsed_ms,
                cause = execution.exit_message.as_deref().unwrap_or("unknown"),
                "Job failed"
            ),
            _ => info!(
                job = %execution.job_name,
                run_id = execution.run_id,
                status = %execution.status,
                read = execution.read_count,
                written = execution.written_count,
                skipped = execution.skipped_count,
                elapsed_ms,
                "Job finished"
            ),
        }

        Ok(())
    }
}
