//! Execution contexts
//!
//! An [`ExecutionContext`] is the entry point for running a job. Each run gets
//! its own [`WorkerContext`] holding a scratch area and stores, and the
//! execution context refuses to start a run whose files overlap a run that is
//! still in progress.

pub mod config;
pub mod worker;

pub use config::{ConcurrencyMode, ContextConfig, IntermediateBackend};
pub use worker::{WorkerContext, WorkerContextSpec};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, HearthError, Result};
use crate::fileref::StoreSet;
use crate::job::Job;
use crate::subprocess::SubprocessManager;

/// Outcome of a successful top-level run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub job: String,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

type ActiveRuns = Mutex<HashMap<Uuid, BTreeSet<String>>>;

#[derive(Debug)]
pub struct ExecutionContext {
    config: ContextConfig,
    subprocess: SubprocessManager,
    active: ActiveRuns,
}

impl ExecutionContext {
    pub fn new(config: ContextConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            subprocess: SubprocessManager::production(),
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the process runner used by the process-pool scheduler
    pub fn with_subprocess(mut self, subprocess: SubprocessManager) -> Self {
        self.subprocess = subprocess;
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of runs currently in progress
    pub fn active_runs(&self) -> usize {
        self.lock_active().len()
    }

    /// Run a job to completion in a fresh worker context
    pub async fn run(&self, job: &Job) -> Result<RunSummary> {
        let _guard = self.claim(job.bindings().all_paths())?;

        let worker = Arc::new(WorkerContext::open(
            self.config.clone(),
            self.subprocess.clone(),
        )?);
        self.check_durable_bindings(job, worker.stores())?;
        let run_id = worker.run_id();
        let started_at = Utc::now();
        let start = Instant::now();
        info!("Starting run {} of {}", run_id, job.name());

        let result = worker.run_batch(vec![job.clone()]).await;
        // Scratch cleanup happens here whether or not the run succeeded
        drop(worker);

        match result {
            Ok(()) => {
                let elapsed = start.elapsed();
                info!("Finished run {} of {} in {:.2?}", run_id, job.name(), elapsed);
                Ok(RunSummary {
                    run_id,
                    job: job.name().to_string(),
                    started_at,
                    elapsed,
                })
            }
            Err(e) => {
                warn!("Run {} of {} failed: {}", run_id, job.name(), e);
                Err(e)
            }
        }
    }

    /// Worker processes each get their own stores, so nothing they write to a
    /// non-durable store reaches the parent
    fn check_durable_bindings(&self, job: &Job, stores: &StoreSet) -> Result<()> {
        if self.config.concurrency != ConcurrencyMode::Processes {
            return Ok(());
        }
        let volatile: Vec<String> = job
            .bindings()
            .all_paths()
            .into_iter()
            .filter(|path| !stores.resolve(path).0.is_durable())
            .collect();
        if volatile.is_empty() {
            return Ok(());
        }
        Err(HearthError::config_with_code(
            ErrorCode::CONFIG_BACKEND_MODE,
            format!(
                "Process-pool concurrency cannot use in-memory paths: {}",
                volatile.join(", ")
            ),
        ))
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, BTreeSet<String>>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn claim(&self, paths: BTreeSet<String>) -> Result<RunClaim<'_>> {
        let mut active = self.lock_active();

        let overlap: BTreeSet<String> = active
            .values()
            .flat_map(|claimed| claimed.intersection(&paths).cloned())
            .collect();
        if !overlap.is_empty() {
            let listed: Vec<String> = overlap.into_iter().collect();
            return Err(HearthError::execution_with_code(
                ErrorCode::EXEC_RUN_OVERLAP,
                format!(
                    "Files are in use by another active run: {}",
                    listed.join(", ")
                ),
                listed.first().cloned(),
            ));
        }

        let token = Uuid::new_v4();
        active.insert(token, paths);
        Ok(RunClaim {
            active: &self.active,
            token,
        })
    }
}

/// Releases a run's files when the run ends
struct RunClaim<'a> {
    active: &'a ActiveRuns,
    token: Uuid,
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.token);
    }
}
