//! Run-wide configuration for execution contexts

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, HearthError, Result};

/// Where sequence intermediates are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntermediateBackend {
    /// On-disk scratch area, visible to worker processes (default)
    #[default]
    Temp,
    /// In-process memory (serial and thread-pool runs only)
    Memory,
}

impl IntermediateBackend {
    pub fn is_durable(&self) -> bool {
        matches!(self, IntermediateBackend::Temp)
    }
}

/// How a batch with more than one job is executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    Serial,
    #[default]
    Threads,
    Processes,
}

impl std::str::FromStr for ConcurrencyMode {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "serial" | "none" => Ok(ConcurrencyMode::Serial),
            "threads" | "thread" | "threading" => Ok(ConcurrencyMode::Threads),
            "processes" | "process" | "multiprocessing" => Ok(ConcurrencyMode::Processes),
            other => Err(HearthError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("Unknown concurrency mode '{}'", other),
            )),
        }
    }
}

impl std::str::FromStr for IntermediateBackend {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "temp" => Ok(IntermediateBackend::Temp),
            "memory" | "mem" => Ok(IntermediateBackend::Memory),
            other => Err(HearthError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("Unknown intermediate backend '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Backend for auto-generated intermediate files
    #[serde(default)]
    pub intermediates: IntermediateBackend,

    #[serde(default)]
    pub concurrency: ConcurrencyMode,

    /// Upper bound on concurrently running jobs in one thread-pool batch
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Upper bound on concurrently running worker processes in one batch
    #[serde(default = "default_max_processes")]
    pub max_processes: usize,

    /// Directory under which run scratch areas are created
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,

    /// Command line that starts a process-pool worker
    #[serde(default)]
    pub worker_command: Option<Vec<String>>,
}

fn default_max_threads() -> usize {
    8
}

fn default_max_processes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            intermediates: IntermediateBackend::default(),
            concurrency: ConcurrencyMode::default(),
            max_threads: default_max_threads(),
            max_processes: default_max_processes(),
            scratch_root: None,
            worker_command: None,
        }
    }
}

impl ContextConfig {
    pub fn serial() -> Self {
        Self::default().with_concurrency(ConcurrencyMode::Serial)
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    pub fn with_intermediates(mut self, backend: IntermediateBackend) -> Self {
        self.intermediates = backend;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_max_processes(mut self, max_processes: usize) -> Self {
        self.max_processes = max_processes;
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn with_worker_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker_command = Some(command.into_iter().map(Into::into).collect());
        self
    }

    /// Reject combinations that would only fail once jobs are running
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == ConcurrencyMode::Processes && !self.intermediates.is_durable() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_BACKEND_MODE,
                "Process-pool concurrency needs a durable intermediate backend; \
                 memory intermediates are invisible to worker processes",
            ));
        }
        if self.max_threads == 0 {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "max_threads must be at least 1",
            ));
        }
        if self.max_processes == 0 {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "max_processes must be at least 1",
            ));
        }
        if matches!(&self.worker_command, Some(command) if command.is_empty()) {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "worker_command must name a program",
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HearthError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("Cannot read config file {}", path.display()),
            )
            .with_source(e)
        })?;
        let config: ContextConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from `HEARTH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("HEARTH_INTERMEDIATES") {
            config.intermediates = value.parse()?;
        }
        if let Ok(value) = std::env::var("HEARTH_CONCURRENCY") {
            config.concurrency = value.parse()?;
        }
        if let Ok(value) = std::env::var("HEARTH_MAX_THREADS") {
            config.max_threads = parse_count("HEARTH_MAX_THREADS", &value)?;
        }
        if let Ok(value) = std::env::var("HEARTH_MAX_PROCESSES") {
            config.max_processes = parse_count("HEARTH_MAX_PROCESSES", &value)?;
        }
        if let Ok(value) = std::env::var("HEARTH_SCRATCH_DIR") {
            config.scratch_root = Some(PathBuf::from(value));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_count(var: &str, value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|e| {
        HearthError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("{} must be a positive integer, got '{}'", var, value),
        )
        .with_source(e)
    })
}
