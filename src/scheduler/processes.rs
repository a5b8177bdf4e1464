use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::{first_failure, Scheduler};
use crate::context::{ContextConfig, WorkerContext};
use crate::error::{ErrorCode, HearthError, Result};
use crate::job::Job;
use crate::subprocess::{ProcessCommandBuilder, ProcessOutput};
use crate::worker::{WorkerOutcome, WorkerTask};

/// Runs each job in a separate worker process, at most `max_processes` at a time
#[derive(Debug, Clone)]
pub struct ProcessPoolScheduler {
    max_processes: usize,
}

impl ProcessPoolScheduler {
    pub fn new(max_processes: usize) -> Self {
        Self {
            max_processes: max_processes.max(1),
        }
    }
}

/// Command line that starts a worker: configured, or this executable's `worker` subcommand
pub fn worker_argv(config: &ContextConfig) -> Result<Vec<String>> {
    match &config.worker_command {
        Some(command) => Ok(command.clone()),
        None => {
            let exe = std::env::current_exe().map_err(|e| {
                HearthError::execution_with_code(
                    ErrorCode::EXEC_SPAWN_FAILED,
                    "Cannot locate the current executable to start workers",
                    None,
                )
                .with_source(e)
            })?;
            Ok(vec![exe.to_string_lossy().into_owned(), "worker".to_string()])
        }
    }
}

/// Turn a worker's output into the job's result
fn parse_outcome(output: &ProcessOutput, job: &str) -> Result<()> {
    match serde_json::from_str::<WorkerOutcome>(output.stdout.trim()) {
        Ok(outcome) => outcome.into_result(),
        Err(e) if output.status.success() => Err(HearthError::execution_with_code(
            ErrorCode::EXEC_WORKER_PROTOCOL,
            format!("Worker for {} returned an unreadable outcome: {}", job, e),
            None,
        )),
        Err(_) => Err(HearthError::execution_with_code(
            ErrorCode::EXEC_WORKER_FAILED,
            format!(
                "Worker for {} exited with {:?}: {}",
                job,
                output.status,
                output.stderr.trim()
            ),
            None,
        )),
    }
}

#[async_trait]
impl Scheduler for ProcessPoolScheduler {
    fn name(&self) -> &'static str {
        "processes"
    }

    async fn run_batch(&self, jobs: Vec<Job>, worker: &Arc<WorkerContext>) -> Result<()> {
        let argv = worker_argv(worker.config())?;
        let max_parallel = self.max_processes.min(jobs.len()).max(1);
        debug!(
            "Running {} jobs on up to {} worker processes ({})",
            jobs.len(),
            max_parallel,
            argv.join(" ")
        );

        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let runner = worker.subprocess().runner();
        let spec = worker.spec();
        let names: Vec<String> = jobs.iter().map(|job| job.name().to_string()).collect();

        let futures = jobs.into_iter().map(|job| {
            let semaphore = Arc::clone(&semaphore);
            let runner = Arc::clone(&runner);
            let task = WorkerTask {
                context: spec.clone(),
                job: job.recipe(),
            };
            let argv = argv.clone();

            async move {
                let name = job.name().to_string();
                let payload = serde_json::to_string(&task)?;
                let command = ProcessCommandBuilder::from_argv(&argv)
                    .ok_or_else(|| HearthError::config("worker_command must name a program"))?
                    .stdin(payload)
                    .build();

                let _permit = semaphore.acquire().await.map_err(|e| {
                    HearthError::execution(format!("Batch semaphore closed: {}", e))
                })?;
                let output = runner.run(command).await?;
                let result = parse_outcome(&output, &name);
                if let Err(ref e) = result {
                    error!("Worker for {} failed: {}", name, e);
                }
                result
            }
        });

        let results = join_all(futures).await;
        first_failure(&names, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::path_map;
    use crate::context::ConcurrencyMode;
    use crate::job::Transform;
    use crate::subprocess::{ExitStatus, SubprocessManager};
    use std::time::Duration;
    use tempfile::TempDir;

    fn output(status: ExitStatus, stdout: &str) -> ProcessOutput {
        ProcessOutput {
            status,
            stdout: stdout.to_string(),
            stderr: "boom".to_string(),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_parse_outcome() {
        assert!(parse_outcome(&output(ExitStatus::Success, "{\"status\":\"success\"}\n"), "A").is_ok());

        let err = parse_outcome(&output(ExitStatus::Success, "garbage"), "A").unwrap_err();
        assert_eq!(err.code(), ErrorCode::EXEC_WORKER_PROTOCOL);

        let err = parse_outcome(&output(ExitStatus::Error(101), ""), "A").unwrap_err();
        assert_eq!(err.code(), ErrorCode::EXEC_WORKER_FAILED);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_worker_argv_prefers_configured_command() {
        let config = ContextConfig::default().with_worker_command(["hearth-worker", "--quiet"]);
        assert_eq!(worker_argv(&config).unwrap(), vec!["hearth-worker", "--quiet"]);
    }

    #[tokio::test]
    async fn test_batch_sends_one_task_per_job() {
        let dir = TempDir::new().unwrap();
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("fake-worker")
            .returns_stdout("{\"status\":\"success\"}")
            .times(3)
            .finish();

        let config = ContextConfig::default()
            .with_concurrency(ConcurrencyMode::Processes)
            .with_scratch_root(dir.path())
            .with_worker_command(["fake-worker"]);
        let worker = Arc::new(WorkerContext::open(config, subprocess).unwrap());

        let unit = Transform::builder("Leaf")
            .input("a")
            .output("b")
            .script(|_| Ok(()))
            .build()
            .unwrap();
        let jobs = (0..3)
            .map(|i| {
                Job::new(
                    Arc::clone(&unit),
                    path_map([("a", format!("in{}", i))]),
                    path_map([("b", format!("out{}", i))]),
                )
                .unwrap()
            })
            .collect();

        ProcessPoolScheduler::new(2)
            .run_batch(jobs, &worker)
            .await
            .unwrap();

        assert!(mock.verify_called("fake-worker", 3));
        let calls = mock.get_call_history();
        let task: WorkerTask = serde_json::from_str(calls[0].stdin.as_deref().unwrap()).unwrap();
        assert_eq!(task.context.run_id, worker.run_id());
    }

    #[tokio::test]
    async fn test_remote_failure_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("fake-worker")
            .returns_stdout(
                "{\"status\":\"failure\",\"kind\":\"script\",\"code\":5001,\"message\":\"bad row\"}",
            )
            .finish();

        let config = ContextConfig::default()
            .with_concurrency(ConcurrencyMode::Processes)
            .with_scratch_root(dir.path())
            .with_worker_command(["fake-worker"]);
        let worker = Arc::new(WorkerContext::open(config, subprocess).unwrap());
        let unit = Transform::builder("Leaf")
            .input("a")
            .output("b")
            .script(|_| Ok(()))
            .build()
            .unwrap();
        let job = Job::new(unit, path_map([("a", "x")]), path_map([("b", "y")])).unwrap();

        let err = ProcessPoolScheduler::new(1)
            .run_batch(vec![job.clone(), job], &worker)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SCRIPT_FAILED);
        assert_eq!(err.message(), "bad row");
    }

    #[tokio::test]
    async fn test_crashed_worker_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("fake-worker")
            .returns_exit_code(101)
            .returns_stderr("thread 'main' panicked")
            .finish();

        let config = ContextConfig::default()
            .with_concurrency(ConcurrencyMode::Processes)
            .with_scratch_root(dir.path())
            .with_worker_command(["fake-worker"]);
        let worker = Arc::new(WorkerContext::open(config, subprocess).unwrap());
        let unit = Transform::builder("Leaf")
            .input("a")
            .output("b")
            .script(|_| Ok(()))
            .build()
            .unwrap();
        let job = Job::new(unit, path_map([("a", "x")]), path_map([("b", "y")])).unwrap();

        let err = ProcessPoolScheduler::new(2)
            .run_batch(vec![job.clone(), job], &worker)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EXEC_WORKER_FAILED);
        assert!(err.message().contains("panicked"));
    }

    #[tokio::test]
    async fn test_one_failing_worker_does_not_stop_the_rest() {
        let dir = TempDir::new().unwrap();
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("fake-worker")
            .responds_with(|command| {
                let task: WorkerTask =
                    serde_json::from_str(command.stdin.as_deref().unwrap_or_default()).unwrap();
                let outcome = if task.job.bindings.output_paths().contains("out1") {
                    WorkerOutcome::Failure {
                        kind: crate::error::ErrorKind::Storage,
                        code: ErrorCode::STORAGE_IO_ERROR,
                        message: "disk full writing out1".to_string(),
                    }
                } else {
                    WorkerOutcome::Success
                };
                output(ExitStatus::Success, &serde_json::to_string(&outcome).unwrap())
            })
            .finish();

        let config = ContextConfig::default()
            .with_concurrency(ConcurrencyMode::Processes)
            .with_scratch_root(dir.path())
            .with_worker_command(["fake-worker"]);
        let worker = Arc::new(WorkerContext::open(config, subprocess).unwrap());
        let unit = Transform::builder("Leaf")
            .input("a")
            .output("b")
            .script(|_| Ok(()))
            .build()
            .unwrap();
        let jobs = (0..3)
            .map(|i| {
                Job::new(
                    Arc::clone(&unit),
                    path_map([("a", format!("in{}", i))]),
                    path_map([("b", format!("out{}", i))]),
                )
                .unwrap()
            })
            .collect();

        let err = ProcessPoolScheduler::new(3)
            .run_batch(jobs, &worker)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::STORAGE_IO_ERROR);
        assert_eq!(err.message(), "disk full writing out1");
        assert!(mock.verify_called("fake-worker", 3));
    }
}
