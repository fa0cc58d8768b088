//! Core identifiers and enumerations shared by the engine
//!
//! These types define how processes and workflows are identified, the
//! execution modes a check can run in, and the per-run state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::CheckResult;

/// Unique identifier for a process within one workflow
pub type ProcessId = String;

/// Unique identifier for a workflow instance
///
/// Generated when the workflow is assembled, so two workflows loaded from
/// the same description are still distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Create a new random workflow id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a check inside a specific workflow
///
/// This is what front ends hold on to. It carries the owning workflow's id
/// as a back-reference, never the workflow itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckHandle {
    workflow: WorkflowId,
    process: ProcessId,
}

impl CheckHandle {
    pub(crate) fn new(workflow: WorkflowId, process: impl Into<ProcessId>) -> Self {
        Self {
            workflow,
            process: process.into(),
        }
    }

    /// The workflow this check belongs to
    pub fn workflow(&self) -> WorkflowId {
        self.workflow
    }

    /// The process id of the check within its workflow
    pub fn process_id(&self) -> &str {
        &self.process
    }
}

impl fmt::Display for CheckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.process)
    }
}

/// Execution mode of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Read-only evaluation
    #[default]
    Query,
    /// Evaluation that also attempts to correct failures
    Fix,
}

impl Mode {
    /// All modes, query first
    pub const ALL: [Mode; 2] = [Mode::Query, Mode::Fix];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Query => f.write_str("query"),
            Mode::Fix => f.write_str("fix"),
        }
    }
}

/// State of a single check within the evaluator
///
/// `NotRun -> Running -> {Succeeded, Failed, Errored}`. `Running` only
/// exists while the check body executes and is therefore only visible to
/// event listeners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    NotRun,
    Running,
    Succeeded,
    Failed,
    Errored,
}

impl RunState {
    /// Terminal state matching a finished result
    pub fn from_result(result: &CheckResult) -> Self {
        if result.is_null() {
            RunState::Errored
        } else if result.is_successful() {
            RunState::Succeeded
        } else {
            RunState::Failed
        }
    }

    /// Whether this is one of the three outcome states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Errored
        )
    }
}

/// Identity of a workflow as seen by event listeners
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowInfo {
    /// Workflow id
    pub id: WorkflowId,
    /// Human-readable workflow name
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_from_result() {
        assert_eq!(
            RunState::from_result(&CheckResult::success()),
            RunState::Succeeded
        );
        assert_eq!(
            RunState::from_result(&CheckResult::failed(["a"])),
            RunState::Failed
        );
        assert_eq!(
            RunState::from_result(&CheckResult::null("boom")),
            RunState::Errored
        );
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::NotRun.is_terminal());
    }

    #[test]
    fn test_handle_display_is_process_id() {
        let handle = CheckHandle::new(WorkflowId::new(), "unique-names");
        assert_eq!(handle.to_string(), "unique-names");
        assert_eq!(handle.process_id(), "unique-names");
    }

    #[test]
    fn test_workflow_ids_differ() {
        assert_ne!(WorkflowId::new(), WorkflowId::new());
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&Mode::Fix).unwrap(), "\"fix\"");
        assert_eq!(Mode::ALL, [Mode::Query, Mode::Fix]);
    }
}
