//! Workflow and DAG evaluator
//!
//! A [`Workflow`] owns a process graph, the result cache for its checks,
//! and the event broadcaster listeners subscribe to. [`Workflow::run_checks`]
//! is the evaluator:
//!
//! 1. The whole request is validated before anything executes.
//! 2. The requested checks and their transitive dependencies are ordered
//!    dependencies first, ties broken by declaration order.
//! 3. Each process either reuses its cached result or executes inside a
//!    failure boundary that turns errors and panics into null results.
//! 4. Results are returned in the order the checks were requested.
//!
//! Per run a check moves `NotRun -> Running -> {Succeeded, Failed, Errored}`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::cache::ResultCache;
use crate::check::{CheckProcess, ProcessKind};
use crate::config::QaConfig;
use crate::context::CheckContext;
use crate::description::WorkflowDescription;
use crate::error::{QaError, Result};
use crate::events::{CheckEvent, CheckListener, EventBroadcaster, EventKind, ListenerId, Retention};
use crate::graph::ProcessGraph;
use crate::registry::CheckRegistry;
use crate::result::CheckResult;
use crate::storage::BlobStore;
use crate::types::{CheckHandle, Mode, ProcessId, RunState, WorkflowId, WorkflowInfo};
use crate::validation::validate_description;

/// Options for one evaluator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Recompute the requested checks even when a cached result exists
    pub clear_result: bool,
    /// Reject batches spanning more than one workflow
    pub single_workflow: bool,
}

impl RunOptions {
    /// Options that force recomputation of the requested checks
    pub fn forced() -> Self {
        Self::default().with_clear_result(true)
    }

    pub fn with_clear_result(mut self, clear_result: bool) -> Self {
        self.clear_result = clear_result;
        self
    }

    pub fn with_single_workflow(mut self, single_workflow: bool) -> Self {
        self.single_workflow = single_workflow;
        self
    }
}

/// A named DAG of processes with its result cache
pub struct Workflow {
    info: WorkflowInfo,
    graph: ProcessGraph,
    cache: ResultCache,
    states: HashMap<ProcessId, RunState>,
    events: EventBroadcaster,
    log_progress: bool,
}

impl Workflow {
    /// Create an empty workflow
    pub fn new(name: impl Into<String>) -> Self {
        let id = WorkflowId::new();
        Self {
            info: WorkflowInfo {
                id,
                name: name.into(),
            },
            graph: ProcessGraph::new(id),
            cache: ResultCache::new(),
            states: HashMap::new(),
            events: EventBroadcaster::new(),
            log_progress: false,
        }
    }

    /// Assemble a workflow from a description
    ///
    /// The description is validated against the registry first; every
    /// problem found is reported in one [`QaError::InvalidDescription`].
    pub fn from_description(desc: &WorkflowDescription, registry: &CheckRegistry) -> Result<Self> {
        let errors = validate_description(desc, Some(registry));
        if !errors.is_empty() {
            return Err(QaError::InvalidDescription(errors));
        }

        let mut workflow = Self::new(desc.name.clone());
        for process in &desc.processes {
            let kind = registry.instantiate(process)?;
            workflow.add_process(process.id.clone(), kind)?;
        }
        for edge in &desc.edges {
            workflow.add_dependency(&edge.target, &edge.source)?;
        }
        log::debug!(
            "Assembled workflow '{}' with {} processes and {} edges",
            workflow.info.name,
            workflow.graph.len(),
            workflow.graph.edge_count()
        );
        Ok(workflow)
    }

    /// Apply the settings of an engine configuration
    pub fn configure(&mut self, config: &QaConfig) {
        self.log_progress = config.log_check_progress;
    }

    pub fn id(&self) -> WorkflowId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &WorkflowInfo {
        &self.info
    }

    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    /// Read-only view of the result cache
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    // Structure

    /// Add a check and return its handle
    pub fn add_check(&mut self, id: impl Into<ProcessId>, check: CheckProcess) -> Result<CheckHandle> {
        let id = id.into();
        self.graph.add_process(id.clone(), ProcessKind::Check(check))?;
        Ok(CheckHandle::new(self.info.id, id))
    }

    /// Add a check or plain process
    pub fn add_process(&mut self, id: impl Into<ProcessId>, kind: impl Into<ProcessKind>) -> Result<()> {
        self.graph.add_process(id, kind.into())
    }

    /// Remove a process, its edges and its cached result
    pub fn remove_process(&mut self, id: &str) -> Result<()> {
        self.graph.remove_process(id)?;
        self.cache.clear(id);
        self.states.remove(id);
        Ok(())
    }

    /// Make `node` depend on `dependency`; see [`ProcessGraph::add_dependency`]
    pub fn add_dependency(&mut self, node: &str, dependency: &str) -> Result<bool> {
        self.graph.add_dependency(node, dependency)
    }

    pub fn remove_dependency(&mut self, node: &str, dependency: &str) -> Result<bool> {
        self.graph.remove_dependency(node, dependency)
    }

    // Front-end surface

    /// Handles of every check, in declaration order
    pub fn list_checks(&self) -> Vec<CheckHandle> {
        self.graph
            .iter()
            .filter(|node| node.as_check().is_some())
            .map(|node| CheckHandle::new(self.info.id, node.id()))
            .collect()
    }

    /// Handle of the check registered under `id`
    pub fn handle(&self, id: &str) -> Result<CheckHandle> {
        match self.graph.get(id) {
            Some(node) if node.as_check().is_some() => Ok(CheckHandle::new(self.info.id, id)),
            _ => Err(QaError::UnknownProcess(id.to_string())),
        }
    }

    /// The check behind a handle of this workflow
    pub fn check(&self, handle: &CheckHandle) -> Option<&CheckProcess> {
        if handle.workflow() != self.info.id {
            return None;
        }
        self.graph.get(handle.process_id())?.as_check()
    }

    pub fn has_cache(&self, handle: &CheckHandle) -> bool {
        handle.workflow() == self.info.id && self.cache.contains(handle.process_id())
    }

    /// Cached result of a check; `None` means it has not run yet
    pub fn get_cache(&self, handle: &CheckHandle) -> Option<Arc<CheckResult>> {
        if handle.workflow() != self.info.id {
            return None;
        }
        self.cache.get(handle.process_id())
    }

    /// Drop the cached result of a check; returns whether one existed
    pub fn clear_cache(&mut self, handle: &CheckHandle) -> bool {
        if handle.workflow() != self.info.id {
            return false;
        }
        self.states.remove(handle.process_id());
        self.cache.clear(handle.process_id())
    }

    pub fn clear_all_caches(&mut self) {
        self.cache.clear_all();
        self.states.clear();
    }

    /// State of a check after the last run
    pub fn check_state(&self, handle: &CheckHandle) -> RunState {
        if handle.workflow() != self.info.id {
            return RunState::NotRun;
        }
        self.states
            .get(handle.process_id())
            .copied()
            .unwrap_or_default()
    }

    pub fn on_pre_check<L>(&mut self, listener: &Arc<L>, retention: Retention) -> ListenerId
    where
        L: CheckListener + 'static,
    {
        self.events.subscribe(EventKind::PreCheck, listener, retention)
    }

    pub fn on_post_check<L>(&mut self, listener: &Arc<L>, retention: Retention) -> ListenerId
    where
        L: CheckListener + 'static,
    {
        self.events.subscribe(EventKind::PostCheck, listener, retention)
    }

    pub fn on_check_error<L>(&mut self, listener: &Arc<L>, retention: Retention) -> ListenerId
    where
        L: CheckListener + 'static,
    {
        self.events.subscribe(EventKind::CheckError, listener, retention)
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBroadcaster {
        &mut self.events
    }

    // Evaluation

    /// Check that a request can run without executing anything
    pub(crate) fn validate_request(&self, checks: &[CheckHandle], mode: Mode) -> Result<()> {
        for handle in checks {
            if handle.workflow() != self.info.id {
                return Err(QaError::CrossWorkflow {
                    check: handle.process_id().to_string(),
                    expected: self.info.id,
                    found: handle.workflow(),
                });
            }
            let check = self
                .graph
                .get(handle.process_id())
                .and_then(|node| node.as_check())
                .ok_or_else(|| QaError::UnknownProcess(handle.process_id().to_string()))?;
            if mode == Mode::Fix && !check.implements_fix() {
                return Err(QaError::UnsupportedMode {
                    check: check.label().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run checks in the given mode and return their results in request order
    ///
    /// Structural problems (a handle of another workflow, an unknown check,
    /// fix mode on a check without fix support) fail the call before any
    /// check executes. A check that errors or panics yields a null result
    /// and the run continues. A listener error aborts the run.
    ///
    /// Unrequested dependencies always run in query mode and reuse their
    /// cached result when present; `clear_result` only forces the
    /// requested checks.
    pub fn run_checks(
        &mut self,
        checks: &[CheckHandle],
        mode: Mode,
        options: &RunOptions,
        ctx: &mut CheckContext,
    ) -> Result<Vec<(CheckHandle, Arc<CheckResult>)>> {
        self.validate_request(checks, mode)?;

        let requested: HashSet<&str> = checks.iter().map(|h| h.process_id()).collect();
        let order = self
            .graph
            .execution_order(&checks.iter().map(|h| h.process_id()).collect::<Vec<_>>())?;
        log::debug!(
            "Running {} of '{}' in {} mode ({} processes scheduled, clear_result={})",
            checks.len(),
            self.info.name,
            mode,
            order.len(),
            options.clear_result
        );

        for id in &order {
            let is_requested = requested.contains(id.as_str());
            if !(is_requested && options.clear_result) && self.cache.contains(id) {
                log::trace!("Reusing cached result of '{}'", id);
                continue;
            }
            let run_mode = if is_requested { mode } else { Mode::Query };
            self.execute(id, run_mode, ctx)?;
        }

        let results = checks
            .iter()
            .map(|handle| {
                let result = self
                    .cache
                    .get(handle.process_id())
                    .ok_or_else(|| QaError::UnknownProcess(handle.process_id().to_string()))?;
                Ok((handle.clone(), result))
            })
            .collect::<Result<Vec<_>>>()?;
        log::debug!("Finished run of '{}'", self.info.name);
        Ok(results)
    }

    /// Execute one process inside the failure boundary
    fn execute(&mut self, id: &str, mode: Mode, ctx: &mut CheckContext) -> Result<()> {
        let node = self
            .graph
            .get(id)
            .ok_or_else(|| QaError::UnknownProcess(id.to_string()))?;
        let handle = CheckHandle::new(self.info.id, id);

        self.states.insert(id.to_string(), RunState::Running);
        if let Err(e) = self.events.fire(
            &self.info,
            &CheckEvent::PreCheck {
                check: handle.clone(),
            },
        ) {
            self.states.insert(id.to_string(), RunState::NotRun);
            return Err(e.into());
        }

        let depth = ctx.undo().depth();
        if mode == Mode::Fix {
            ctx.undo_mut().begin_chunk(format!("fix {}", node.label()));
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| node.kind().run(mode, ctx)));
        ctx.undo_mut().unwind_to(depth);

        let failure = match outcome {
            Ok(Ok(result)) => {
                let result = self.cache.put(id, mode, result);
                self.states
                    .insert(id.to_string(), RunState::from_result(&result));
                if self.log_progress {
                    log::info!("{} [{}]: {}", node.label(), mode, result);
                } else {
                    log::debug!("{} [{}]: {}", node.label(), mode, result);
                }
                self.events.fire(
                    &self.info,
                    &CheckEvent::PostCheck {
                        check: handle,
                        result,
                    },
                )?;
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("Check '{}' panicked: {}", node.label(), panic_message(&*payload)),
        };

        log::warn!("{} [{}] errored: {}", node.label(), mode, failure);
        self.cache.put(id, mode, CheckResult::null(failure.clone()));
        self.states.insert(id.to_string(), RunState::Errored);
        self.events.fire(
            &self.info,
            &CheckEvent::CheckError {
                check: handle,
                error: failure,
            },
        )?;
        Ok(())
    }

    // Persistence

    /// Store all cached results under `data_id`
    pub fn save_results(&self, store: &mut BlobStore, data_id: &str) -> Result<()> {
        self.cache.save_to(store, data_id)
    }

    /// Load results saved with [`Workflow::save_results`]
    ///
    /// Entries for processes this workflow does not have are dropped.
    pub fn load_results(&mut self, store: &BlobStore, data_id: &str) -> Result<bool> {
        if !self.cache.load_from(store, data_id)? {
            return Ok(false);
        }
        let stale: Vec<ProcessId> = store
            .get(data_id)
            .map(|payload| {
                payload
                    .keys()
                    .filter(|id| !self.graph.contains(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for id in &stale {
            self.cache.clear(id);
        }
        self.states.clear();
        for node in self.graph.iter() {
            if let Some(result) = self.cache.get(node.id()) {
                self.states
                    .insert(node.id().to_string(), RunState::from_result(&result));
            }
        }
        Ok(true)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
