use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use super::error::ProcessError;

/// A child process to start: program, arguments and optional stdin payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl ProcessCommand {
    /// Program and arguments joined for log and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    fn from_std(status: std::process::ExitStatus) -> Self {
        if status.success() {
            return ExitStatus::Success;
        }
        if let Some(code) = status.code() {
            return ExitStatus::Error(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }
        ExitStatus::Error(1)
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync + std::fmt::Debug {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands with `tokio::process`, stdout and stderr captured
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn spawn(command: &ProcessCommand) -> Result<tokio::process::Child, ProcessError> {
        let stdin = if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ProcessError::CommandNotFound(command.program.clone())
                }
                _ => ProcessError::SpawnFailed {
                    command: command.display(),
                    source: e,
                },
            })
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = Instant::now();
        debug!("Executing subprocess: {}", command.display());

        let mut child = Self::spawn(&command)?;
        if let (Some(payload), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            trace!("Writing {} bytes to stdin", payload.len());
            stdin.write_all(payload.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let result = ProcessOutput {
            status: ExitStatus::from_std(output.status),
            stdout: String::from_utf8(output.stdout)?,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };

        match result.status {
            ExitStatus::Success => debug!(
                "Subprocess finished in {:?}: {}",
                result.duration,
                command.display()
            ),
            status => warn!(
                "Subprocess ended with {:?} after {:?}: {}",
                status,
                result.duration,
                command.display()
            ),
        }
        Ok(result)
    }
}
