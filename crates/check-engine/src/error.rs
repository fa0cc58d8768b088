//! Error types for the check engine

use thiserror::Error;

use crate::check::CheckError;
use crate::events::ListenerError;
use crate::types::WorkflowId;
use crate::validation::ValidationError;

/// Result type alias using QaError
pub type Result<T> = std::result::Result<T, QaError>;

/// Errors that can occur in the check engine
///
/// Structural errors (cycles, unsupported modes, cross-workflow batches) are
/// returned to the immediate caller. A check that fails while executing is
/// never surfaced through this type by a batch run; the evaluator turns it
/// into a null result instead.
#[derive(Debug, Error)]
pub enum QaError {
    /// Adding the dependency would close a cycle
    #[error("Adding dependency '{dependency}' to '{process}' would create a cycle")]
    Cycle { process: String, dependency: String },

    /// Fix mode was requested on a check without fix capability
    #[error("Check '{check}' does not implement fix mode")]
    UnsupportedMode { check: String },

    /// A batch mixed checks of different workflows
    #[error("Check '{check}' belongs to workflow {found}, expected workflow {expected}")]
    CrossWorkflow {
        check: String,
        expected: WorkflowId,
        found: WorkflowId,
    },

    /// Process id is not registered in the workflow (or is not a check)
    #[error("Unknown process: {0}")]
    UnknownProcess(String),

    /// Workflow id is not part of the workflow set
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(WorkflowId),

    /// Workflow name is already used by another workflow in the set
    #[error("Duplicate workflow name: {0}")]
    DuplicateWorkflow(String),

    /// Process id is already in use
    #[error("Duplicate process id: {0}")]
    DuplicateProcess(String),

    /// Workflow description failed validation
    #[error("Invalid workflow description: {}", join_errors(.0))]
    InvalidDescription(Vec<ValidationError>),

    /// A check body returned an error
    #[error("Check '{check}' failed to execute: {source}")]
    Check {
        check: String,
        #[source]
        source: CheckError,
    },

    /// The registry factory for a process failed
    #[error("Could not instantiate process '{process}': {source}")]
    Instantiation {
        process: String,
        #[source]
        source: CheckError,
    },

    /// An event listener failed
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    /// Blob storage misuse
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QaError {
    /// Create a storage error with a message
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_description_lists_every_error() {
        let err = QaError::InvalidDescription(vec![
            ValidationError::CycleDetected,
            ValidationError::DuplicateProcess {
                process_id: "a".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Cycle detected"));
        assert!(msg.contains("'a'"));
    }
}
