//! Required Attributes Check
//!
//! Nodes of the configured types must carry the configured attribute
//! values. The fix writes the expected values.

use std::collections::BTreeMap;

use check_engine::{
    Check, CheckContext, CheckDescribe, CheckDescriptor, CheckError, CheckResult, Fixable,
    ProcessBody, ProcessCategory,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::parse_config;
use crate::scene::{current_scene, NodeId, Scene, SetAttribute};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequiredAttributesConfig {
    /// Node types the check applies to; empty means every node
    pub node_types: Vec<String>,
    /// Attribute name to expected value
    pub values: BTreeMap<String, Value>,
}

pub struct RequiredAttributes {
    config: RequiredAttributesConfig,
}

impl RequiredAttributes {
    pub fn new(config: RequiredAttributesConfig) -> Self {
        Self { config }
    }

    pub fn create(config: &Value) -> Result<ProcessBody, CheckError> {
        let config: RequiredAttributesConfig = parse_config(config)?;
        if config.values.is_empty() {
            return Err(CheckError::new("'values' must name at least one attribute"));
        }
        Ok(ProcessBody::Check(Box::new(Self::new(config))))
    }

    /// `(node, attribute, expected)` for every mismatch
    fn mismatches<'a>(&'a self, scene: &Scene) -> Vec<(NodeId, &'a str, &'a Value)> {
        let mut out = Vec::new();
        for (id, node) in scene.iter() {
            if !self.config.node_types.is_empty() && !self.config.node_types.contains(&node.node_type) {
                continue;
            }
            for (attribute, expected) in &self.config.values {
                if node.attributes.get(attribute) != Some(expected) {
                    out.push((id, attribute.as_str(), expected));
                }
            }
        }
        out
    }

    fn item(scene: &Scene, id: NodeId, attribute: &str) -> Result<String, CheckError> {
        Ok(format!("{}.{}", scene.path(id)?, attribute))
    }
}

impl CheckDescribe for RequiredAttributes {
    fn descriptor() -> CheckDescriptor {
        CheckDescriptor {
            check_type: "required-attributes".to_string(),
            label: "Required attributes".to_string(),
            description: "Attributes hold their studio default values".to_string(),
            implements_fix: true,
            category: ProcessCategory::Check,
        }
    }
}

inventory::submit!(check_engine::CheckDescriptorFn {
    descriptor: RequiredAttributes::descriptor,
    factory: RequiredAttributes::create,
});

impl Check for RequiredAttributes {
    fn query(&self, ctx: &mut CheckContext) -> Result<CheckResult, CheckError> {
        let scene = current_scene(ctx)?;
        let failed = self
            .mismatches(scene)
            .into_iter()
            .map(|(id, attribute, _)| Self::item(scene, id, attribute))
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

impl Fixable for RequiredAttributes {
    fn fix(&self, ctx: &mut CheckContext) -> Result<CheckResult, CheckError> {
        let mismatches = self.mismatches(current_scene(ctx)?);
        let mut fixed = Vec::new();
        for (id, attribute, expected) in mismatches {
            fixed.push(Self::item(current_scene(ctx)?, id, attribute)?);
            ctx.apply(SetAttribute::new(id, attribute, expected.clone()))?;
        }
        Ok(CheckResult::fixed(fixed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::setup_context;
    use serde_json::json;

    fn check() -> RequiredAttributes {
        RequiredAttributes::new(
            parse_config(&json!({
                "nodeTypes": ["mesh"],
                "values": {"castsShadows": true}
            }))
            .unwrap(),
        )
    }

    #[test]
    fn test_requires_values() {
        assert!(RequiredAttributes::create(&Value::Null).is_err());
    }

    #[test]
    fn test_fix_writes_expected_values() {
        let mut scene = Scene::new();
        let body = scene.add_node("body_GEO", "mesh");
        let eyes = scene.add_node("eyes_GEO", "mesh");
        scene.add_node("cam", "camera");
        scene.set_attribute(eyes, "castsShadows", json!(true)).unwrap();
        let mut ctx = CheckContext::new();
        setup_context(&mut ctx, scene);
        let check = check();

        let query = check.query(&mut ctx).unwrap();
        assert_eq!(query.failed_items(), ["|body_GEO.castsShadows"]);

        let fix = check.fix(&mut ctx).unwrap();
        assert_eq!(fix.fixed_items(), ["|body_GEO.castsShadows"]);
        assert_eq!(
            current_scene(&ctx).unwrap().attribute(body, "castsShadows"),
            Some(&json!(true))
        );
        assert!(check.query(&mut ctx).unwrap().is_successful());
    }
}
