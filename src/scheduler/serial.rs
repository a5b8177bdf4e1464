use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::Scheduler;
use crate::context::WorkerContext;
use crate::error::Result;
use crate::job::Job;

/// Runs jobs one after another in the calling task, stopping at the first failure
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialScheduler;

#[async_trait]
impl Scheduler for SerialScheduler {
    fn name(&self) -> &'static str {
        "serial"
    }

    async fn run_batch(&self, jobs: Vec<Job>, worker: &Arc<WorkerContext>) -> Result<()> {
        for job in &jobs {
            debug!("Serial: {}", job.name());
            job.execute(worker).await?;
        }
        Ok(())
    }
}
