//! Unique Names Check
//!
//! Reports nodes whose short name is shared with another node and renames
//! all but the first of them.

use std::collections::BTreeMap;

use check_engine::{
    Check, CheckContext, CheckDescribe, CheckDescriptor, CheckError, CheckResult, Fixable,
    ProcessBody, ProcessCategory,
};
use serde::{Deserialize, Serialize};

use crate::config::parse_config;
use crate::scene::{current_scene, NodeId, Rename, Scene};

/// Configuration for the unique names check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UniqueNamesConfig {
    /// Node types excluded from the check (e.g. "camera")
    pub ignore_types: Vec<String>,
}

/// Unique Names Check
///
/// # Failed items
/// Full paths of every node sharing its short name.
///
/// # Fix
/// Keeps the first node of each clash and appends `_1`, `_2`, ... to the
/// others until their names are free.
pub struct UniqueNames {
    config: UniqueNamesConfig,
}

impl UniqueNames {
    pub fn new(config: UniqueNamesConfig) -> Self {
        Self { config }
    }

    /// Registry factory
    pub fn create(config: &serde_json::Value) -> Result<ProcessBody, CheckError> {
        Ok(ProcessBody::Check(Box::new(Self::new(parse_config(config)?))))
    }

    /// Groups of nodes sharing a name, in name order
    fn clashes(&self, scene: &Scene) -> Vec<Vec<NodeId>> {
        let mut by_name: BTreeMap<&str, Vec<NodeId>> = BTreeMap::new();
        for (id, node) in scene.iter() {
            if self.config.ignore_types.contains(&node.node_type) {
                continue;
            }
            by_name.entry(node.name.as_str()).or_default().push(id);
        }
        by_name.into_values().filter(|ids| ids.len() > 1).collect()
    }

    fn free_name(scene: &Scene, base: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if scene.find(&candidate).is_empty() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl CheckDescribe for UniqueNames {
    fn descriptor() -> CheckDescriptor {
        CheckDescriptor {
            check_type: "unique-names".to_string(),
            label: "Unique names".to_string(),
            description: "No two nodes share a short name".to_string(),
            implements_fix: true,
            category: ProcessCategory::Check,
        }
    }
}

inventory::submit!(check_engine::CheckDescriptorFn {
    descriptor: UniqueNames::descriptor,
    factory: UniqueNames::create,
});

impl Check for UniqueNames {
    fn query(&self, ctx: &mut CheckContext) -> Result<CheckResult, CheckError> {
        let scene = current_scene(ctx)?;
        let mut failed = Vec::new();
        for id in self.clashes(scene).into_iter().flatten() {
            failed.push(scene.path(id)?);
        }
        if failed.is_empty() {
            Ok(CheckResult::success())
        } else {
            Ok(CheckResult::failed(failed))
        }
    }

    fn fixable(&self) -> Option<&dyn Fixable> {
        Some(self)
    }
}

impl Fixable for UniqueNames {
    fn fix(&self, ctx: &mut CheckContext) -> Result<CheckResult, CheckError> {
        let clashes = self.clashes(current_scene(ctx)?);
        let mut fixed = Vec::new();
        for group in clashes {
            for &id in group.iter().skip(1) {
                let scene = current_scene(ctx)?;
                let path = scene.path(id)?;
                let base = scene.get(id).map(|n| n.name.clone()).unwrap_or_default();
                let name = Self::free_name(scene, &base);
                log::debug!("Renaming {} to {}", path, name);
                ctx.apply(Rename::new(id, name))?;
                fixed.push(path);
            }
        }
        Ok(CheckResult::fixed(fixed))
    }
}
