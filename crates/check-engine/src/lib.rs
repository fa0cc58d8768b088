//! Check Engine - quality-assurance workflows for scene content
//!
//! This crate runs small, independently authored checks against a scene,
//! caches their results and optionally applies their fixes. It provides:
//!
//! - A process graph with cycle rejection and declaration-order scheduling
//! - Query and fix modes, with fix capability declared per check type
//! - A result cache keyed by process identity
//! - Pre-check / post-check / check-error events with weak listeners
//! - Chunked undo of fixes and a blob store for persisted results
//!
//! # Architecture
//!
//! - `Workflow`: owns the graph, the cache and the broadcaster; `run_checks`
//!   is the evaluator
//! - `WorkflowSet`: workflows loaded from description files
//! - `CheckRegistry`: check types contributed at link time via `inventory`
//! - `CheckContext`: typed extensions through which checks reach the scene
//!
//! # Example
//!
//! ```ignore
//! use check_engine::{CheckRegistry, Mode, RunOptions, Workflow, WorkflowDescription};
//!
//! let registry = CheckRegistry::with_builtins();
//! let desc = WorkflowDescription::from_path("qa/scene.json")?;
//! let mut workflow = Workflow::from_description(&desc, &registry)?;
//! let checks = workflow.list_checks();
//! let results = workflow.run_checks(&checks, Mode::Query, &RunOptions::default(), &mut ctx)?;
//! ```

pub mod builder;
pub mod cache;
pub mod check;
pub mod config;
pub mod context;
pub mod description;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod graph;
pub mod registry;
pub mod result;
pub mod storage;
pub mod types;
pub mod undo;
pub mod validation;
pub mod workflow;
pub mod workflow_set;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use cache::{CacheStats, CachedResult, ResultCache};
pub use check::{Check, CheckError, CheckProcess, Fixable, PlainProcess, Process, ProcessKind};
pub use config::QaConfig;
pub use context::{CheckContext, Extensions};
pub use description::{EdgeDescription, ProcessDescription, WorkflowDescription};
pub use descriptor::{
    CheckDescribe, CheckDescriptor, CheckDescriptorFn, ProcessBody, ProcessCategory,
    ProcessFactory,
};
pub use error::{QaError, Result};
pub use events::{
    BroadcastConfig, CheckEvent, CheckListener, EventBroadcaster, EventKind, ListenerError,
    ListenerId, RecordingListener, Retention,
};
pub use graph::{ProcessGraph, ProcessNode};
pub use registry::CheckRegistry;
pub use result::{CheckResult, Outcome};
pub use storage::{BlobStore, Encoding, Payload, PayloadRegistry};
pub use types::{CheckHandle, Mode, ProcessId, RunState, WorkflowId, WorkflowInfo};
pub use undo::{Operation, UndoQueue};
pub use validation::{validate_description, ValidationError};
pub use workflow::{RunOptions, Workflow};
pub use workflow_set::WorkflowSet;
