//! The set of workflows loaded into a session

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::QaConfig;
use crate::context::CheckContext;
use crate::description::WorkflowDescription;
use crate::error::{QaError, Result};
use crate::registry::CheckRegistry;
use crate::result::CheckResult;
use crate::storage::BlobStore;
use crate::types::{CheckHandle, Mode, WorkflowId};
use crate::workflow::{RunOptions, Workflow};

/// Workflows in load order
///
/// Names are unique within a set; saved results are keyed by them.
#[derive(Default)]
pub struct WorkflowSet {
    workflows: Vec<Workflow>,
    persistence: bool,
}

impl WorkflowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` description in `dir`, in file name order
    pub fn load_dir(dir: impl AsRef<Path>, registry: &CheckRegistry) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut set = Self::new();
        for path in paths {
            let desc = WorkflowDescription::from_path(&path)?;
            let workflow = Workflow::from_description(&desc, registry)?;
            log::info!(
                "Loaded workflow '{}' from {}",
                workflow.name(),
                path.display()
            );
            set.insert(workflow)?;
        }
        Ok(set)
    }

    /// Load the configured workflow directory and apply the configuration
    ///
    /// Without a configured directory the set starts empty.
    pub fn from_config(config: &QaConfig, registry: &CheckRegistry) -> Result<Self> {
        let mut set = match &config.workflow_dir {
            Some(dir) => Self::load_dir(dir, registry)?,
            None => Self::new(),
        };
        for workflow in &mut set.workflows {
            workflow.configure(config);
        }
        set.persistence = config.persistence_enabled;
        Ok(set)
    }

    /// Add a workflow; its name must not be taken
    pub fn insert(&mut self, workflow: Workflow) -> Result<WorkflowId> {
        if self.by_name(workflow.name()).is_some() {
            return Err(QaError::DuplicateWorkflow(workflow.name().to_string()));
        }
        let id = workflow.id();
        self.workflows.push(workflow);
        Ok(id)
    }

    pub fn remove(&mut self, id: WorkflowId) -> Option<Workflow> {
        let pos = self.workflows.iter().position(|w| w.id() == id)?;
        Some(self.workflows.remove(pos))
    }

    pub fn get(&self, id: WorkflowId) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id() == id)
    }

    pub fn get_mut(&mut self, id: WorkflowId) -> Option<&mut Workflow> {
        self.workflows.iter_mut().find(|w| w.id() == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.iter()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn persistence_enabled(&self) -> bool {
        self.persistence
    }

    pub fn set_persistence(&mut self, enabled: bool) {
        self.persistence = enabled;
    }

    /// Handles of every check of every workflow
    pub fn list_checks(&self) -> Vec<CheckHandle> {
        self.workflows.iter().flat_map(Workflow::list_checks).collect()
    }

    /// Result cached for a handle by its owning workflow
    pub fn get_cache(&self, handle: &CheckHandle) -> Option<Arc<CheckResult>> {
        self.get(handle.workflow())?.get_cache(handle)
    }

    /// Run a batch that may span several workflows
    ///
    /// Handles are grouped by workflow and every group is validated before
    /// any check runs. With `single_workflow` set, a batch spanning more
    /// than one workflow fails with [`QaError::CrossWorkflow`].
    pub fn run_checks(
        &mut self,
        checks: &[CheckHandle],
        mode: Mode,
        options: &RunOptions,
        ctx: &mut CheckContext,
    ) -> Result<Vec<(CheckHandle, Arc<CheckResult>)>> {
        let mut groups: Vec<(WorkflowId, Vec<CheckHandle>)> = Vec::new();
        for handle in checks {
            match groups.iter_mut().find(|(id, _)| *id == handle.workflow()) {
                Some((_, group)) => group.push(handle.clone()),
                None => groups.push((handle.workflow(), vec![handle.clone()])),
            }
        }

        if options.single_workflow && groups.len() > 1 {
            let (expected, _) = &groups[0];
            let (found, group) = &groups[1];
            return Err(QaError::CrossWorkflow {
                check: group[0].process_id().to_string(),
                expected: *expected,
                found: *found,
            });
        }
        for (id, group) in &groups {
            let workflow = self.get(*id).ok_or(QaError::UnknownWorkflow(*id))?;
            workflow.validate_request(group, mode)?;
        }

        let mut results: HashMap<CheckHandle, Arc<CheckResult>> = HashMap::new();
        for (id, group) in &groups {
            let workflow = self.get_mut(*id).ok_or(QaError::UnknownWorkflow(*id))?;
            results.extend(workflow.run_checks(group, mode, options, ctx)?);
        }

        checks
            .iter()
            .map(|handle| {
                let result = results
                    .get(handle)
                    .cloned()
                    .ok_or_else(|| QaError::UnknownProcess(handle.process_id().to_string()))?;
                Ok((handle.clone(), result))
            })
            .collect()
    }

    /// Persist the results of every workflow, keyed by workflow name
    pub fn save_results(&self, store: &mut BlobStore) -> Result<()> {
        for workflow in &self.workflows {
            workflow.save_results(store, workflow.name())?;
        }
        Ok(())
    }

    /// Load results saved with [`WorkflowSet::save_results`]; returns how many workflows had data
    pub fn load_results(&mut self, store: &BlobStore) -> Result<usize> {
        let mut loaded = 0;
        for workflow in &mut self.workflows {
            let name = workflow.name().to_string();
            if workflow.load_results(store, &name)? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Save results if persistence is enabled; returns whether anything was written
    pub fn persist(&self, store: &mut BlobStore) -> Result<bool> {
        if !self.persistence {
            log::debug!("Persistence disabled, results not saved");
            return Ok(false);
        }
        self.save_results(store)?;
        Ok(true)
    }

    /// Load saved results if persistence is enabled
    pub fn restore(&mut self, store: &BlobStore) -> Result<usize> {
        if !self.persistence {
            return Ok(0);
        }
        let loaded = self.load_results(store)?;
        log::debug!("Restored results of {} workflows", loaded);
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::builder::WorkflowBuilder;
    use crate::check::{Check, CheckError, CheckProcess};
    use crate::descriptor::{CheckDescriptor, ProcessBody, ProcessCategory};

    struct Pass;

    impl Check for Pass {
        fn query(&self, _ctx: &mut CheckContext) -> std::result::Result<CheckResult, CheckError> {
            Ok(CheckResult::success())
        }
    }

    fn workflow(name: &str, ids: &[&str]) -> Workflow {
        let mut wf = Workflow::new(name);
        for id in ids {
            wf.add_check(*id, CheckProcess::new(*id, Pass)).unwrap();
        }
        wf
    }

    fn registry() -> CheckRegistry {
        let mut registry = CheckRegistry::new();
        registry.register(
            CheckDescriptor {
                check_type: "pass".to_string(),
                label: "Pass".to_string(),
                description: "Always passes".to_string(),
                implements_fix: false,
                category: ProcessCategory::Check,
            },
            |_| Ok(ProcessBody::Check(Box::new(Pass))),
        );
        registry
    }

    #[test]
    fn test_mixed_batch_runs_per_workflow() {
        let mut set = WorkflowSet::new();
        set.insert(workflow("first", &["a", "b"])).unwrap();
        set.insert(workflow("second", &["c"])).unwrap();
        let checks = set.list_checks();
        assert_eq!(checks.len(), 3);

        let request = [checks[2].clone(), checks[0].clone()];
        let results = set
            .run_checks(&request, Mode::Query, &RunOptions::default(), &mut CheckContext::new())
            .unwrap();

        assert_eq!(results[0].0, request[0]);
        assert_eq!(results[1].0, request[1]);
        assert!(set.get_cache(&checks[2]).is_some());
        assert!(set.get_cache(&checks[1]).is_none());
    }

    #[test]
    fn test_single_workflow_rejects_mixed_batch() {
        let mut set = WorkflowSet::new();
        set.insert(workflow("first", &["a"])).unwrap();
        set.insert(workflow("second", &["c"])).unwrap();
        let checks = set.list_checks();

        let err = set
            .run_checks(
                &checks,
                Mode::Query,
                &RunOptions::default().with_single_workflow(true),
                &mut CheckContext::new(),
            )
            .unwrap_err();
        assert!(matches!(err, QaError::CrossWorkflow { .. }));
        assert!(set.get_cache(&checks[0]).is_none());
    }

    #[test]
    fn test_unknown_workflow() {
        let mut set = WorkflowSet::new();
        let orphan = workflow("orphan", &["a"]).list_checks();
        let err = set
            .run_checks(&orphan, Mode::Query, &RunOptions::default(), &mut CheckContext::new())
            .unwrap_err();
        assert!(matches!(err, QaError::UnknownWorkflow(_)));
    }

    #[test]
    fn test_load_dir_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b-scene", "a-rig"] {
            let desc = WorkflowBuilder::new(name).add_process("p", "pass").build();
            let mut file = std::fs::File::create(dir.path().join(format!("{}.json", name))).unwrap();
            file.write_all(desc.to_json().unwrap().as_bytes()).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let config = QaConfig {
            workflow_dir: Some(dir.path().to_path_buf()),
            ..QaConfig::default()
        };
        let set = WorkflowSet::from_config(&config, &registry()).unwrap();

        let names: Vec<_> = set.iter().map(|w| w.name().to_string()).collect();
        assert_eq!(names, vec!["a-rig", "b-scene"]);
        assert!(set.by_name("a-rig").is_some());
    }

    #[test]
    fn test_results_persist_by_workflow_name() {
        let mut set = WorkflowSet::new();
        set.insert(workflow("first", &["a"])).unwrap();
        let checks = set.list_checks();
        set.run_checks(&checks, Mode::Query, &RunOptions::default(), &mut CheckContext::new())
            .unwrap();

        let mut store = BlobStore::new("qa_");
        set.save_results(&mut store).unwrap();
        assert_eq!(store.data_ids(), vec!["first"]);

        let id = checks[0].workflow();
        set.get_mut(id).unwrap().clear_all_caches();
        assert_eq!(set.load_results(&store).unwrap(), 1);
        assert!(set.get_cache(&checks[0]).unwrap().is_successful());
    }

    #[test]
    fn test_duplicate_workflow_name_rejected() {
        let mut set = WorkflowSet::new();
        set.insert(workflow("qa", &["a"])).unwrap();
        let err = set.insert(workflow("qa", &["a"])).unwrap_err();
        assert!(matches!(err, QaError::DuplicateWorkflow(name) if name == "qa"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_load_dir_rejects_shared_name() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["one", "two"] {
            let desc = WorkflowBuilder::new("qa").add_process("a", "pass").build();
            std::fs::write(dir.path().join(format!("{}.json", file)), desc.to_json().unwrap())
                .unwrap();
        }

        let err = WorkflowSet::load_dir(dir.path(), &registry()).err().unwrap();
        assert!(matches!(err, QaError::DuplicateWorkflow(name) if name == "qa"));
    }

    #[test]
    fn test_persistence_follows_config() {
        let mut ctx = CheckContext::new();
        let mut store = BlobStore::new("qa_");

        let mut disabled = WorkflowSet::from_config(&QaConfig::default(), &registry()).unwrap();
        disabled.insert(workflow("first", &["a"])).unwrap();
        let checks = disabled.list_checks();
        disabled
            .run_checks(&checks, Mode::Query, &RunOptions::default(), &mut ctx)
            .unwrap();
        assert!(!disabled.persist(&mut store).unwrap());
        assert!(store.data_ids().is_empty());

        let config = QaConfig {
            persistence_enabled: true,
            ..QaConfig::default()
        };
        let mut enabled = WorkflowSet::from_config(&config, &registry()).unwrap();
        assert!(enabled.persistence_enabled());
        enabled.insert(workflow("first", &["a"])).unwrap();
        let checks = enabled.list_checks();
        enabled
            .run_checks(&checks, Mode::Query, &RunOptions::default(), &mut ctx)
            .unwrap();
        assert!(enabled.persist(&mut store).unwrap());
        assert_eq!(store.data_ids(), vec!["first"]);

        enabled.get_mut(checks[0].workflow()).unwrap().clear_all_caches();
        assert_eq!(disabled.restore(&store).unwrap(), 0);
        assert_eq!(enabled.restore(&store).unwrap(), 1);
        assert!(enabled.get_cache(&checks[0]).unwrap().is_successful());
    }
}
