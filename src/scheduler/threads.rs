use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::{first_failure, Scheduler};
use crate::context::WorkerContext;
use crate::error::{ErrorCode, HearthError, Result};
use crate::job::Job;

/// Runs each job as its own task, at most `max_threads` at a time
#[derive(Debug, Clone)]
pub struct ThreadPoolScheduler {
    max_threads: usize,
}

impl ThreadPoolScheduler {
    pub fn new(max_threads: usize) -> Self {
        Self {
            max_threads: max_threads.max(1),
        }
    }
}

#[async_trait]
impl Scheduler for ThreadPoolScheduler {
    fn name(&self) -> &'static str {
        "threads"
    }

    async fn run_batch(&self, jobs: Vec<Job>, worker: &Arc<WorkerContext>) -> Result<()> {
        let max_parallel = self.max_threads.min(jobs.len()).max(1);
        debug!("Running {} jobs on up to {} threads", jobs.len(), max_parallel);

        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let names: Vec<String> = jobs.iter().map(|job| job.name().to_string()).collect();

        let handles = jobs.into_iter().map(|job| {
            let semaphore = Arc::clone(&semaphore);
            let worker = Arc::clone(worker);
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    HearthError::execution_with_code(
                        ErrorCode::EXEC_GENERIC,
                        format!("Batch semaphore closed: {}", e),
                        None,
                    )
                })?;
                job.execute(&worker).await
            })
        });

        let results = join_all(handles)
            .await
            .into_iter()
            .zip(&names)
            .map(|(joined, name)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("Task for {} did not complete: {}", name, e);
                    Err(HearthError::Other {
                        code: ErrorCode::OTHER_INTERNAL_ERROR,
                        message: format!("Task for {} did not complete: {}", name, e),
                        source: None,
                    })
                }
            })
            .collect();

        first_failure(&names, results)
    }
}
