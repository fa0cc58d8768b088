//! Naming Convention Check
//!
//! Every node of a configured type must end with that type's suffix.

use std::collections::BTreeMap;

use check_engine::{
    Check, CheckContext, CheckDescribe, CheckDescriptor, CheckError, CheckResult, Fixable,
    ProcessBody, ProcessCategory,
};
use serde::{Deserialize, Serialize};

use crate::config::parse_config;
use crate::scene::{current_scene, NodeId, Rename, Scene};

/// Configuration for the naming convention check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NamingConventionConfig {
    /// Required suffix per node type
    pub suffixes: BTreeMap<String, String>,
}

impl Default for NamingConventionConfig {
    fn default() -> Self {
        let suffixes = [("mesh", "_GEO"), ("transform", "_GRP"), ("joint", "_JNT")]
            .into_iter()
            .map(|(t, s)| (t.to_string(), s.to_string()))
            .collect();
        Self { suffixes }
    }
}

pub struct NamingConvention {
    config: NamingConventionConfig,
}

impl NamingConvention {
    pub fn new(config: NamingConventionConfig) -> Self {
        Self { config }
    }

    pub fn create(config: &serde_json::Value) -> Result<ProcessBody, CheckError> {
        Ok(ProcessBody::Check(Box::new(Self::new(parse_config(config)?))))
    }

    /// Offending nodes with the suffix they are missing
    fn violations<'a>(&'a self, scene: &Scene) -> Vec<(NodeId, &'a str)> {
        scene
            .iter()
            .filter_map(|(id, node)| {
                let suffix = self.config.suffixes.get(&node.node_type)?;
                (!node.name.ends_with(suffix.as_str())).then_some((id, suffix.as_str()))
            })
            .collect()
    }
}

impl CheckDescribe for NamingConvention {
    fn descriptor() -> CheckDescriptor {
        CheckDescriptor {
            check_type: "naming-convention".to_string(),
            label: "Naming convention".to_string(),
            description: "Node names end with the suffix of their type".to_string(),
            implements_fix: true,
            category: ProcessCategory::Check,
        }
    }
}

inventory::submit!(check_engine::CheckDescriptorFn {
    descriptor: NamingConvention::descriptor,
    factory: NamingConvention::create,
});

impl Check for NamingConvention {
    fn query(&self, ctx: &mut CheckContext) -> Result<CheckResult, CheckError> {
        let scene = current_scene(ctx)?;
        let failed = self
            .violations(scene)
            .into_iter()
            .map(|(id, _)| scene.path(id))
            .collect::<Result<Vec<_>, _>>()?;
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

impl Fixable for NamingConvention {
    fn fix(&self, ctx: &mut CheckContext) -> Result<CheckResult, CheckError> {
        let violations = self.violations(current_scene(ctx)?);
        let mut fixed = Vec::new();
        for (id, suffix) in violations {
            let scene = current_scene(ctx)?;
            let path = scene.path(id)?;
            let name = scene
                .get(id)
                .map(|n| format!("{}{}", n.name, suffix))
                .unwrap_or_default();
            ctx.apply(Rename::new(id, name))?;
            fixed.push(path);
        }
        Ok(CheckResult::fixed(fixed))
    }
}
