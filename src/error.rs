//! Failure taxonomy for a packaging run.
//!
//! Stages return `anyhow::Result` and raise one of these as the root cause,
//! so the binary can pick an exit code without parsing messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Failure {
    /// Missing or unreadable manifest argument/content.
    #[error("{0}")]
    Usage(String),

    /// Manifest field absent or of the wrong shape.
    #[error("invalid manifest field \"{field}\": {reason}")]
    Validation { field: String, reason: String },

    /// Build host could not be provisioned.
    #[error("{0}")]
    Environment(String),

    /// An external command exited non-zero or could not be spawned.
    #[error("running command: {command} ({status})")]
    Execution { command: String, status: String },

    /// Working tree link topology could not be built.
    #[error("{0}")]
    Layout(String),
}

impl Failure {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code (sysexits.h values).
    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::Usage(_) => 64,
            Failure::Validation { .. } => 65,
            Failure::Environment(_) => 69,
            Failure::Execution { .. } => 70,
            Failure::Layout(_) => 73,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Failure::Usage(_) => "usage",
            Failure::Validation { .. } => "validation",
            Failure::Environment(_) => "environment",
            Failure::Execution { .. } => "execution",
            Failure::Layout(_) => "layout",
        }
    }
}

/// Find the outermost classified failure in an error, looking through any
/// context layers.
pub fn classify(err: &anyhow::Error) -> Option<&Failure> {
    err.downcast_ref::<Failure>()
}
