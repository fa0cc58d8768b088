//! Check and process capabilities
//!
//! A workflow node wraps a unit of work. Most nodes are checks: they
//! implement [`Check`] and may additionally expose the [`Fixable`]
//! capability. Nodes that only prepare state for other checks implement the
//! plain [`Process`] trait instead.
//!
//! Capabilities are selected when the concrete type is written, not
//! attached at runtime: a check announces its fix support by returning
//! itself from [`Check::fixable`].

use thiserror::Error;

use crate::context::CheckContext;
use crate::error::{QaError, Result};
use crate::result::CheckResult;
use crate::types::Mode;

/// Failure raised from inside a check body
///
/// Ordinary check failures are unsuccessful [`CheckResult`]s. This error is
/// reserved for "the check itself broke" and becomes a null result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CheckError {
    message: String,
}

impl CheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for CheckError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for CheckError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Query capability shared by every check
pub trait Check: Send + Sync {
    /// Evaluate the check without changing anything
    fn query(&self, ctx: &mut CheckContext) -> std::result::Result<CheckResult, CheckError>;

    /// Fix capability, if this check has one
    fn fixable(&self) -> Option<&dyn Fixable> {
        None
    }
}

/// Corrective capability of a check
pub trait Fixable: Send + Sync {
    /// Correct what the query would report and return the fixed items
    fn fix(&self, ctx: &mut CheckContext) -> std::result::Result<CheckResult, CheckError>;
}

/// A non-check unit of work inside a workflow
pub trait Process: Send + Sync {
    fn execute(&self, mode: Mode, ctx: &mut CheckContext) -> std::result::Result<(), CheckError>;
}

/// A named check with its annotation
pub struct CheckProcess {
    label: String,
    annotation: String,
    check: Box<dyn Check>,
}

impl CheckProcess {
    /// Wrap a check implementation
    pub fn new(label: impl Into<String>, check: impl Check + 'static) -> Self {
        Self::from_boxed(label, Box::new(check))
    }

    /// Wrap an already boxed check implementation
    pub fn from_boxed(label: impl Into<String>, check: Box<dyn Check>) -> Self {
        Self {
            label: label.into(),
            annotation: String::new(),
            check,
        }
    }

    /// Set the description shown next to the check
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Whether the check offers a corrective action
    pub fn implements_fix(&self) -> bool {
        self.check.fixable().is_some()
    }

    /// Run the check in the given mode
    ///
    /// Fails with [`QaError::UnsupportedMode`] for fix mode on a check
    /// without the fix capability, and with [`QaError::Check`] when the
    /// body returns an error.
    pub fn run(&self, mode: Mode, ctx: &mut CheckContext) -> Result<CheckResult> {
        let outcome = match mode {
            Mode::Query => self.check.query(ctx),
            Mode::Fix => match self.check.fixable() {
                Some(fixable) => fixable.fix(ctx),
                None => {
                    return Err(QaError::UnsupportedMode {
                        check: self.label.clone(),
                    })
                }
            },
        };
        outcome.map_err(|source| QaError::Check {
            check: self.label.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for CheckProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckProcess")
            .field("label", &self.label)
            .field("implements_fix", &self.implements_fix())
            .finish()
    }
}

/// A named plain process
pub struct PlainProcess {
    label: String,
    process: Box<dyn Process>,
}

impl PlainProcess {
    pub fn new(label: impl Into<String>, process: impl Process + 'static) -> Self {
        Self::from_boxed(label, Box::new(process))
    }

    pub fn from_boxed(label: impl Into<String>, process: Box<dyn Process>) -> Self {
        Self {
            label: label.into(),
            process,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Execute the process; a completed process reports success
    pub fn run(&self, mode: Mode, ctx: &mut CheckContext) -> Result<CheckResult> {
        self.process
            .execute(mode, ctx)
            .map(|()| CheckResult::success())
            .map_err(|source| QaError::Check {
                check: self.label.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for PlainProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainProcess")
            .field("label", &self.label)
            .finish()
    }
}

/// What a workflow node wraps
#[derive(Debug)]
pub enum ProcessKind {
    Check(CheckProcess),
    Plain(PlainProcess),
}

impl ProcessKind {
    pub fn label(&self) -> &str {
        match self {
            ProcessKind::Check(check) => check.label(),
            ProcessKind::Plain(process) => process.label(),
        }
    }

    pub fn as_check(&self) -> Option<&CheckProcess> {
        match self {
            ProcessKind::Check(check) => Some(check),
            ProcessKind::Plain(_) => None,
        }
    }

    /// Uniform call contract used by the evaluator
    pub fn run(&self, mode: Mode, ctx: &mut CheckContext) -> Result<CheckResult> {
        match self {
            ProcessKind::Check(check) => check.run(mode, ctx),
            ProcessKind::Plain(process) => process.run(mode, ctx),
        }
    }
}

impl From<CheckProcess> for ProcessKind {
    fn from(check: CheckProcess) -> Self {
        ProcessKind::Check(check)
    }
}

impl From<PlainProcess> for ProcessKind {
    fn from(process: PlainProcess) -> Self {
        ProcessKind::Plain(process)
    }
}
