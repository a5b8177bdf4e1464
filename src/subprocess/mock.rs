use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

type Responder = Arc<dyn Fn(&ProcessCommand) -> ProcessOutput + Send + Sync>;

#[derive(Clone, Default)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

impl fmt::Debug for MockProcessRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProcessRunner").finish_non_exhaustive()
    }
}

struct MockExpectation {
    program: String,
    response: ProcessOutput,
    responder: Option<Responder>,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_command(&self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                response: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                },
                responder: None,
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().filter(|cmd| cmd.program == program).count() == times
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.call_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.call_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());

        let mut expectations = self.expectations.lock().unwrap_or_else(|e| e.into_inner());
        for expectation in expectations.iter_mut() {
            if expectation.program != command.program {
                continue;
            }

            expectation.times_called += 1;
            if let Some(expected) = expectation.expected_times {
                if expectation.times_called > expected {
                    return Err(ProcessError::MockExpectationNotMet(format!(
                        "Command '{}' called {} times, expected {}",
                        command.program, expectation.times_called, expected
                    )));
                }
            }

            return Ok(match &expectation.responder {
                Some(responder) => responder(&command),
                None => expectation.response.clone(),
            });
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {}",
            command.display()
        )))
    }
}

impl MockCommandConfig {
    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    /// Compute the response from the command, e.g. to echo its stdin
    pub fn responds_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&ProcessCommand) -> ProcessOutput + Send + Sync + 'static,
    {
        self.expectation.responder = Some(Arc::new(responder));
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(self.expectation);
    }
}
