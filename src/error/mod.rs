use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

use crate::tag::Direction;

/// Broad classification of a failure, telling a caller what has to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The pipeline definition or its bindings are wrong
    Configuration,
    /// The environment is wrong: missing inputs, existing outputs, overlapping paths
    Execution,
    /// A transform's own logic failed
    Script,
    /// A store could not be read or written
    Storage,
    Other,
}

/// The unified error type for hearth
#[derive(Error, Debug)]
pub enum HearthError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {direction} file set mismatch: {}", file_set_message(.extra, .missing))]
    FileSet {
        code: u16,
        direction: Direction,
        extra: Vec<String>,
        missing: Vec<String>,
    },

    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        path: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Script error: {message}")]
    Script {
        code: u16,
        message: String,
        job: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn file_set_message(extra: &[String], missing: &[String]) -> String {
    let mut messages = Vec::new();
    if !extra.is_empty() {
        messages.push(format!("Extra files: {}", extra.join(", ")));
    }
    if !missing.is_empty() {
        messages.push(format!("Missing files: {}", missing.join(", ")));
    }
    messages.join("; ")
}

impl HearthError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a file set error listing extra and missing tag names
    pub fn file_set(direction: Direction, extra: Vec<String>, missing: Vec<String>) -> Self {
        Self::FileSet {
            code: ErrorCode::CONFIG_FILE_SET,
            direction,
            extra,
            missing,
        }
    }

    /// Create an execution error with specific code and offending path
    pub fn execution_with_code(
        code: u16,
        message: impl Into<String>,
        path: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create an execution error with default code
    pub fn execution(message: impl Into<String>) -> Self {
        Self::execution_with_code(ErrorCode::EXEC_GENERIC, message, None)
    }

    /// Create a script error with specific code
    pub fn script_with_code(code: u16, message: impl Into<String>, job: Option<String>) -> Self {
        Self::Script {
            code,
            message: message.into(),
            job,
            source: None,
        }
    }

    /// Create a script error with default code
    pub fn script(message: impl Into<String>) -> Self {
        Self::script_with_code(ErrorCode::SCRIPT_GENERIC, message, None)
    }

    /// Create a storage error with specific code and path
    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<String>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a storage error with default code
    pub fn storage(message: impl Into<String>) -> Self {
        Self::storage_with_code(ErrorCode::STORAGE_GENERIC, message, None)
    }

    /// Create a generic other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Rebuild an error reported by a worker process
    pub fn from_remote(kind: ErrorKind, code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Configuration => Self::config_with_code(code, message),
            ErrorKind::Execution => Self::execution_with_code(code, message, None),
            ErrorKind::Script => Self::script_with_code(code, message, None),
            ErrorKind::Storage => Self::storage_with_code(code, message, None),
            ErrorKind::Other => Self::Other {
                code,
                message,
                source: None,
            },
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Execution { source: src, .. }
            | Self::Script { source: src, .. }
            | Self::Storage { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::FileSet { .. } => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Execution { message, .. }
            | Self::Script { message, .. }
            | Self::Storage { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::FileSet { .. } => {}
        }
        self
    }

    /// Attach the name of the job a script error came from
    pub fn with_job(mut self, name: impl Into<String>) -> Self {
        if let Self::Script { job: ref mut j, .. } = self {
            *j = Some(name.into());
        }
        self
    }

    /// Get the broad kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::FileSet { .. } => ErrorKind::Configuration,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Script { .. } => ErrorKind::Script,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::FileSet { code, .. }
            | Self::Execution { code, .. }
            | Self::Script { code, .. }
            | Self::Storage { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Execution => 3,
            ErrorKind::Script => 4,
            ErrorKind::Storage => 5,
            ErrorKind::Other => 1,
        }
    }

    /// True when the failure was detected before any scheduling or I/O
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// The message without code or kind prefix
    pub fn message(&self) -> String {
        match self {
            Self::Config { message, .. }
            | Self::Execution { message, .. }
            | Self::Script { message, .. }
            | Self::Storage { message, .. }
            | Self::Other { message, .. } => message.clone(),
            Self::FileSet {
                direction,
                extra,
                missing,
                ..
            } => format!(
                "{} file set mismatch: {}",
                direction,
                file_set_message(extra, missing)
            ),
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Pipeline definition problem: {}", message),
            Self::FileSet {
                direction,
                extra,
                missing,
                ..
            } => format!(
                "The {} paths do not match the declared tags ({})",
                direction,
                file_set_message(extra, missing)
            ),
            Self::Execution { message, path, .. } => match path {
                Some(p) => format!("Cannot run with '{}': {}", p, message),
                None => format!("Cannot run: {}", message),
            },
            Self::Script { message, job, .. } => match job {
                Some(name) => format!("Transform '{}' failed: {}", name, message),
                None => format!("Transform failed: {}", message),
            },
            Self::Storage { message, path, .. } => match path {
                Some(p) => format!("Storage error at {}: {}", p, message),
                None => format!("Storage error: {}", message),
            },
            Self::Other { message, .. } => message.clone(),
        }
    }
}

/// Type alias for Results using HearthError
pub type Result<T> = std::result::Result<T, HearthError>;

impl From<std::io::Error> for HearthError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;

        let (code, message) = match err.kind() {
            IoKind::NotFound => (ErrorCode::STORAGE_NOT_FOUND, "File or directory not found"),
            IoKind::PermissionDenied => (ErrorCode::STORAGE_PERMISSION_DENIED, "Permission denied"),
            IoKind::AlreadyExists => (ErrorCode::STORAGE_ALREADY_EXISTS, "Already exists"),
            _ => (ErrorCode::STORAGE_IO_ERROR, "IO operation failed"),
        };

        HearthError::storage_with_code(code, message, None).with_source(err)
    }
}

impl From<serde_json::Error> for HearthError {
    fn from(err: serde_json::Error) -> Self {
        HearthError::config_with_code(ErrorCode::CONFIG_INVALID_JSON, "Invalid JSON syntax")
            .with_source(err)
    }
}

impl From<toml::de::Error> for HearthError {
    fn from(err: toml::de::Error) -> Self {
        HearthError::config_with_code(ErrorCode::CONFIG_INVALID_TOML, "Invalid TOML syntax")
            .with_source(err)
    }
}
