//! Empty Groups Check
//!
//! Query-only: reports group nodes without children. Deleting nodes is left
//! to the artist.

use check_engine::{
    Check, CheckContext, CheckDescribe, CheckDescriptor, CheckError, CheckResult, ProcessBody,
    ProcessCategory,
};
use serde::{Deserialize, Serialize};

use crate::config::parse_config;
use crate::scene::current_scene;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmptyGroupsConfig {
    /// Node types treated as groups
    pub group_types: Vec<String>,
}

impl Default for EmptyGroupsConfig {
    fn default() -> Self {
        Self {
            group_types: vec!["transform".to_string()],
        }
    }
}

pub struct EmptyGroups {
    config: EmptyGroupsConfig,
}

impl EmptyGroups {
    pub fn new(config: EmptyGroupsConfig) -> Self {
        Self { config }
    }

    pub fn create(config: &serde_json::Value) -> Result<ProcessBody, CheckError> {
        Ok(ProcessBody::Check(Box::new(Self::new(parse_config(config)?))))
    }
}

impl CheckDescribe for EmptyGroups {
    fn descriptor() -> CheckDescriptor {
        CheckDescriptor {
            check_type: "empty-groups".to_string(),
            label: "Empty groups".to_string(),
            description: "Every group has at least one child".to_string(),
            implements_fix: false,
            category: ProcessCategory::Check,
        }
    }
}

inventory::submit!(check_engine::CheckDescriptorFn {
    descriptor: EmptyGroups::descriptor,
    factory: EmptyGroups::create,
});

impl Check for EmptyGroups {
    fn query(&self, ctx: &mut CheckContext) -> Result<CheckResult, CheckError> {
        let scene = current_scene(ctx)?;
        let mut failed = Vec::new();
        for (id, node) in scene.iter() {
            if self.config.group_types.contains(&node.node_type) && scene.children(id).is_empty() {
                failed.push(scene.path(id)?);
            }
        }
        if failed.is_empty() {
            Ok(CheckResult::success())
        } else {
            Ok(CheckResult::failed(failed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{setup_context, Scene};

    #[test]
    fn test_reports_childless_groups() {
        let mut scene = Scene::new();
        let rig = scene.add_node("rig_GRP", "transform");
        scene.add_child(rig, "root_JNT", "joint").unwrap();
        scene.add_node("old_GRP", "transform");
        let mut ctx = CheckContext::new();
        setup_context(&mut ctx, scene);

        let check = EmptyGroups::new(EmptyGroupsConfig::default());
        assert!(check.fixable().is_none());
        let result = check.query(&mut ctx).unwrap();
        assert_eq!(result.failed_items(), ["|old_GRP"]);
    }

    #[test]
    fn test_missing_scene_is_an_error() {
        let check = EmptyGroups::new(EmptyGroupsConfig::default());
        let err = check.query(&mut CheckContext::new()).unwrap_err();
        assert!(err.message().contains("scene"));
    }
}
