//! Error taxonomy.
//!
//! Two channels:
//!   CliError - fatal schema / binding / resolution / configuration failures.
//!              The dispatch boundary turns these into a non-zero exit.
//!   JobError - per-job failure inside the task pool. Never fatal.
//!
//! Command bodies and workflow steps use `anyhow::Result`; those are
//! execution errors and map to exit code 1.

use thiserror::Error;

/// Exit code for a caught execution error.
pub const EXIT_EXECUTION: i32 = 1;
/// Exit code for validation / resolution failures.
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid declaration in \"{command}\" command: {message}")]
    Schema { command: String, message: String },

    #[error("{name} command already exist")]
    DuplicateCommand { name: String },

    #[error("{name} command does not exist")]
    UnknownCommand { name: String },

    #[error("command \"{token}\" is ambiguous; candidates: {}", candidates.join(", "))]
    AmbiguousCommand {
        token: String,
        candidates: Vec<String>,
    },

    #[error("required argument: {name}")]
    MissingArgument { command: String, name: String },

    #[error("required option: {name}")]
    MissingOption { command: String, name: String },

    #[error("duplication option in \"{command}\" command: {option}")]
    DuplicateOption { command: String, option: String },

    #[error("unimplemented {step}() method in operator")]
    UnimplementedStep { step: String },

    #[error("workflow step order cannot be empty")]
    EmptyWorkflow,

    #[error("failed to load command from {path}: {message}")]
    Load { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl CliError {
    pub(crate) fn schema(command: &str, message: impl Into<String>) -> Self {
        CliError::Schema {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }

    /// Whether the usage screen of the current command should precede the message.
    pub fn wants_usage(&self) -> bool {
        matches!(
            self,
            CliError::MissingArgument { .. }
                | CliError::MissingOption { .. }
                | CliError::DuplicateOption { .. }
        )
    }
}

/// Outcome of a single failed task-pool job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job #{index} failed: {source}")]
    Failed {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("job #{index} panicked: {message}")]
    Panicked { index: usize, message: String },
}

impl JobError {
    /// Submission index of the job that failed.
    pub fn index(&self) -> usize {
        match self {
            JobError::Failed { index, .. } | JobError::Panicked { index, .. } => *index,
        }
    }
}
