//! Panel model and its event handling

use std::sync::Arc;

use check_engine::{
    CheckContext, CheckEvent, CheckHandle, CheckListener, CheckResult, ListenerError, Mode,
    QaError, Result, Retention, RunOptions, WorkflowId, WorkflowInfo, WorkflowSet,
};
use parking_lot::Mutex;

use crate::row::CheckRow;

/// Panel options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Show a "Run All" button; the panel then accepts checks of one workflow only
    pub run_all_button: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            run_all_button: true,
        }
    }
}

/// Routes workflow events to the matching row
#[derive(Default)]
struct PanelListener {
    rows: Mutex<Vec<CheckRow>>,
}

impl CheckListener for PanelListener {
    fn on_event(
        &self,
        _sender: Option<&WorkflowInfo>,
        event: &CheckEvent,
    ) -> std::result::Result<(), ListenerError> {
        let mut rows = self.rows.lock();
        // events arrive for every check of the workflow, not only ours
        let Some(row) = rows.iter_mut().find(|row| &row.check == event.check()) else {
            return Ok(());
        };
        match event {
            CheckEvent::PreCheck { .. } => row.pre_check(),
            CheckEvent::PostCheck { result, .. } => row.post_check(result),
            CheckEvent::CheckError { .. } => row.check_error(),
        }
        Ok(())
    }
}

/// Headless QA panel
///
/// Holds one row per check and keeps them current through weak event
/// subscriptions: dropping the panel ends delivery without unsubscribing.
pub struct QaPanel {
    config: PanelConfig,
    listener: Arc<PanelListener>,
    subscribed: Vec<WorkflowId>,
}

impl QaPanel {
    pub fn new(config: PanelConfig) -> Self {
        Self {
            config,
            listener: Arc::new(PanelListener::default()),
            subscribed: Vec::new(),
        }
    }

    pub fn config(&self) -> PanelConfig {
        self.config
    }

    /// Display `checks`, replacing the current rows
    ///
    /// With the run-all button enabled, checks of more than one workflow
    /// are rejected with [`QaError::CrossWorkflow`] and the panel is left
    /// unchanged.
    pub fn set_checks(&mut self, workflows: &mut WorkflowSet, checks: &[CheckHandle]) -> Result<()> {
        let mut workflow_ids: Vec<WorkflowId> = Vec::new();
        for handle in checks {
            if workflow_ids.contains(&handle.workflow()) {
                continue;
            }
            workflow_ids.push(handle.workflow());
            if self.config.run_all_button && workflow_ids.len() > 1 {
                return Err(QaError::CrossWorkflow {
                    check: handle.process_id().to_string(),
                    expected: workflow_ids[0],
                    found: handle.workflow(),
                });
            }
        }

        let mut rows: Vec<CheckRow> = Vec::with_capacity(checks.len());
        for handle in checks {
            if rows.iter().any(|row| &row.check == handle) {
                continue;
            }
            let workflow = workflows
                .get(handle.workflow())
                .ok_or(QaError::UnknownWorkflow(handle.workflow()))?;
            let process = workflow
                .check(handle)
                .ok_or_else(|| QaError::UnknownProcess(handle.process_id().to_string()))?;
            rows.push(CheckRow::new(handle.clone(), process));
        }

        for id in workflow_ids {
            if self.subscribed.contains(&id) {
                continue;
            }
            let workflow = workflows.get_mut(id).ok_or(QaError::UnknownWorkflow(id))?;
            workflow.on_pre_check(&self.listener, Retention::Weak);
            workflow.on_post_check(&self.listener, Retention::Weak);
            workflow.on_check_error(&self.listener, Retention::Weak);
            self.subscribed.push(id);
        }

        *self.listener.rows.lock() = rows;
        self.update(workflows);
        Ok(())
    }

    /// Snapshot of the rows in display order
    pub fn rows(&self) -> Vec<CheckRow> {
        self.listener.rows.lock().clone()
    }

    pub fn row(&self, check: &CheckHandle) -> Option<CheckRow> {
        self.listener
            .rows
            .lock()
            .iter()
            .find(|row| &row.check == check)
            .cloned()
    }

    /// Checks currently displayed
    pub fn checks(&self) -> Vec<CheckHandle> {
        self.listener
            .rows
            .lock()
            .iter()
            .map(|row| row.check.clone())
            .collect()
    }

    /// Run one check, always recomputing it (the status or fix button)
    pub fn run_check(
        &self,
        workflows: &mut WorkflowSet,
        check: &CheckHandle,
        mode: Mode,
        ctx: &mut CheckContext,
    ) -> Result<Arc<CheckResult>> {
        self.run_check_with(workflows, check, mode, true, ctx)
    }

    /// Run one check; without `force` a cached result is reused
    pub fn run_check_with(
        &self,
        workflows: &mut WorkflowSet,
        check: &CheckHandle,
        mode: Mode,
        force: bool,
        ctx: &mut CheckContext,
    ) -> Result<Arc<CheckResult>> {
        let options = RunOptions::default().with_clear_result(force);
        workflows
            .run_checks(std::slice::from_ref(check), mode, &options, ctx)?
            .pop()
            .map(|(_, result)| result)
            .ok_or_else(|| QaError::UnknownProcess(check.process_id().to_string()))
    }

    /// Items to select for a check: fixed items, then failed items
    ///
    /// Uses the cached result when there is one and runs the check in query
    /// mode otherwise.
    pub fn select_items(
        &self,
        workflows: &mut WorkflowSet,
        check: &CheckHandle,
        ctx: &mut CheckContext,
    ) -> Result<Vec<String>> {
        let result = match workflows.get_cache(check) {
            Some(result) => result,
            None => self.run_check_with(workflows, check, Mode::Query, false, ctx)?,
        };
        Ok(result
            .fixed_items()
            .iter()
            .chain(result.failed_items())
            .cloned()
            .collect())
    }

    /// Recompute every displayed check in query mode
    ///
    /// Fixing everything at once is deliberately not offered.
    pub fn run_all(
        &self,
        workflows: &mut WorkflowSet,
        ctx: &mut CheckContext,
    ) -> Result<Vec<(CheckHandle, Arc<CheckResult>)>> {
        let checks = self.checks();
        if checks.is_empty() {
            log::info!("No checks found to run");
            return Ok(Vec::new());
        }
        let options = RunOptions::forced().with_single_workflow(self.config.run_all_button);
        workflows.run_checks(&checks, Mode::Query, &options, ctx)
    }

    /// Refresh every row from the cached results
    pub fn update(&self, workflows: &WorkflowSet) {
        for row in self.listener.rows.lock().iter_mut() {
            row.reset();
            if let Some(result) = workflows.get_cache(&row.check) {
                row.set_result(&result);
            }
        }
    }

    /// Rows as JSON for a front end
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&*self.listener.rows.lock())?)
    }
}

impl Default for QaPanel {
    fn default() -> Self {
        Self::new(PanelConfig::default())
    }
}
