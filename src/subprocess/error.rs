use crate::error::{ErrorCode, HearthError};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl From<ProcessError> for HearthError {
    fn from(err: ProcessError) -> Self {
        let (code, command) = match &err {
            ProcessError::CommandNotFound(cmd) => {
                (ErrorCode::EXEC_COMMAND_NOT_FOUND, Some(cmd.clone()))
            }
            ProcessError::SpawnFailed { command, .. } => {
                (ErrorCode::EXEC_SPAWN_FAILED, Some(command.clone()))
            }
            ProcessError::Io(_) => (ErrorCode::EXEC_WORKER_FAILED, None),
            ProcessError::Utf8(_) => (ErrorCode::EXEC_WORKER_PROTOCOL, None),
            ProcessError::MockExpectationNotMet(_) => (ErrorCode::EXEC_GENERIC, None),
        };

        HearthError::execution_with_code(code, err.to_string(), command).with_source(err)
    }
}
