//! Worker process protocol
//!
//! The process-pool scheduler starts one worker process per job and writes a
//! [`WorkerTask`] as JSON on its stdin. The worker rebuilds the job from its
//! recipe, attaches to the parent's run, executes the job and prints a single
//! [`WorkerOutcome`] as JSON on stdout.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error};

use crate::context::{WorkerContext, WorkerContextSpec};
use crate::error::{ErrorKind, HearthError, Result};
use crate::recipe::{JobRecipe, Registry};
use crate::subprocess::SubprocessManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerTask {
    pub context: WorkerContextSpec,
    pub job: JobRecipe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Success,
    Failure {
        kind: ErrorKind,
        code: u16,
        message: String,
    },
}

impl WorkerOutcome {
    pub fn from_result(result: &Result<()>) -> Self {
        match result {
            Ok(()) => WorkerOutcome::Success,
            Err(e) => WorkerOutcome::Failure {
                kind: e.kind(),
                code: e.code(),
                message: e.message(),
            },
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            WorkerOutcome::Success => Ok(()),
            WorkerOutcome::Failure {
                kind,
                code,
                message,
            } => Err(HearthError::from_remote(kind, code, message)),
        }
    }
}

/// Rebuild and execute one task inside this process
pub async fn execute_task(
    task: WorkerTask,
    registry: &Registry,
    subprocess: SubprocessManager,
) -> Result<()> {
    let worker = Arc::new(WorkerContext::attach(task.context, subprocess)?);
    let job = task.job.rebuild(registry)?;
    debug!("Worker executing {} for run {}", job.name(), worker.run_id());
    job.execute(&worker).await
}

/// Handle one serialized task and report its outcome
pub async fn handle(input: &str, registry: &Registry) -> WorkerOutcome {
    let result = match serde_json::from_str::<WorkerTask>(input) {
        Ok(task) => execute_task(task, registry, SubprocessManager::production()).await,
        Err(e) => Err(HearthError::from(e).with_context("malformed worker task")),
    };
    if let Err(ref e) = result {
        error!("Worker task failed: {}", e);
    }
    WorkerOutcome::from_result(&result)
}

/// Read a task from stdin, run it, and write the outcome to stdout
pub async fn serve(registry: &Registry) -> Result<()> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    let outcome = handle(&input, registry).await;
    let mut payload = serde_json::to_vec(&outcome)?;
    payload.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&payload).await?;
    stdout.flush().await?;
    Ok(())
}
