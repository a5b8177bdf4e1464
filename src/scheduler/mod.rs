//! Batch schedulers
//!
//! A scheduler executes a batch of independent jobs inside one worker context.
//! Every member of a batch runs to completion even when a sibling fails; the
//! batch then reports the first failure in batch order.

pub mod processes;
pub mod serial;
pub mod threads;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub use processes::ProcessPoolScheduler;
pub use serial::SerialScheduler;
pub use threads::ThreadPoolScheduler;

use crate::context::{ConcurrencyMode, ContextConfig, WorkerContext};
use crate::error::Result;
use crate::job::Job;

#[async_trait]
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_batch(&self, jobs: Vec<Job>, worker: &Arc<WorkerContext>) -> Result<()>;
}

/// Pick the scheduler for a batch; a batch of one always runs in place
pub fn select(config: &ContextConfig, batch_len: usize) -> Box<dyn Scheduler> {
    if batch_len <= 1 {
        return Box::new(SerialScheduler);
    }
    match config.concurrency {
        ConcurrencyMode::Serial => Box::new(SerialScheduler),
        ConcurrencyMode::Threads => Box::new(ThreadPoolScheduler::new(config.max_threads)),
        ConcurrencyMode::Processes => Box::new(ProcessPoolScheduler::new(config.max_processes)),
    }
}

/// Reduce per-job results to the first failure, logging the rest
fn first_failure(names: &[String], results: Vec<Result<()>>) -> Result<()> {
    let mut first = None;
    for (name, result) in names.iter().zip(results) {
        if let Err(e) = result {
            if first.is_none() {
                first = Some(e);
            } else {
                warn!("Additional failure in batch from {}: {}", name, e);
            }
        }
    }
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
