//! Per-run worker state: scratch area, stores, and batch dispatch

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

use super::config::{ContextConfig, IntermediateBackend};
use crate::error::{HearthError, Result};
use crate::fileref::{StoreSet, MEMORY_SCHEME, TEMP_SCHEME};
use crate::job::Job;
use crate::scheduler;
use crate::subprocess::SubprocessManager;

/// What a worker process needs to join an existing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerContextSpec {
    pub run_id: Uuid,
    pub config: ContextConfig,
    pub scratch_dir: PathBuf,
}

#[derive(Debug)]
enum ScratchArea {
    /// Created by this context and removed when it is dropped
    Owned(TempDir),
    /// Belongs to a run opened elsewhere
    Attached(PathBuf),
}

impl ScratchArea {
    fn path(&self) -> &Path {
        match self {
            ScratchArea::Owned(dir) => dir.path(),
            ScratchArea::Attached(path) => path,
        }
    }
}

/// State shared by every job executing within one run
#[derive(Debug)]
pub struct WorkerContext {
    run_id: Uuid,
    config: ContextConfig,
    scratch: ScratchArea,
    stores: StoreSet,
    subprocess: SubprocessManager,
}

impl WorkerContext {
    /// Open a fresh run with its own scratch area
    pub fn open(config: ContextConfig, subprocess: SubprocessManager) -> Result<Self> {
        let run_id = Uuid::new_v4();
        let prefix = format!("hearth-{}-", run_id);

        let dir = match &config.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix(&prefix).tempdir()?,
        };
        debug!("Opened run {} with scratch area {}", run_id, dir.path().display());

        let stores = StoreSet::new(dir.path());
        Ok(Self {
            run_id,
            config,
            scratch: ScratchArea::Owned(dir),
            stores,
            subprocess,
        })
    }

    /// Join a run opened by another process; the scratch area is left in place on drop
    pub fn attach(spec: WorkerContextSpec, subprocess: SubprocessManager) -> Result<Self> {
        if !spec.scratch_dir.is_dir() {
            return Err(HearthError::execution(format!(
                "Scratch area {} for run {} does not exist",
                spec.scratch_dir.display(),
                spec.run_id
            )));
        }

        let stores = StoreSet::new(&spec.scratch_dir);
        Ok(Self {
            run_id: spec.run_id,
            config: spec.config,
            scratch: ScratchArea::Attached(spec.scratch_dir),
            stores,
            subprocess,
        })
    }

    pub fn spec(&self) -> WorkerContextSpec {
        WorkerContextSpec {
            run_id: self.run_id,
            config: self.config.clone(),
            scratch_dir: self.scratch.path().to_path_buf(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn stores(&self) -> &StoreSet {
        &self.stores
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn subprocess(&self) -> &SubprocessManager {
        &self.subprocess
    }

    /// A fresh path for an auto-placed intermediate, unique within this run
    pub fn scratch_path(&self) -> String {
        let scheme = match self.config.intermediates {
            IntermediateBackend::Temp => TEMP_SCHEME,
            IntermediateBackend::Memory => MEMORY_SCHEME,
        };
        format!("{}{}/{}", scheme, self.run_id, Uuid::new_v4())
    }

    /// Execute a batch of independent jobs with the configured scheduler
    pub async fn run_batch(self: &Arc<Self>, jobs: Vec<Job>) -> Result<()> {
        let scheduler = scheduler::select(&self.config, jobs.len());
        debug!(
            "Run {}: dispatching {} job(s) to {} scheduler",
            self.run_id,
            jobs.len(),
            scheduler.name()
        );
        scheduler.run_batch(jobs, self).await
    }
}
