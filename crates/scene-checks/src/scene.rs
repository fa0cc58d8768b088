//! In-memory scene object store
//!
//! Checks reach the scene through the [`CheckContext`] extensions under
//! [`SCENE_KEY`]. Every mutation a check performs goes through an
//! [`Operation`] so that fixes land on the context's undo queue.

use std::collections::BTreeMap;

use check_engine::{CheckContext, CheckError, Extensions, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Extension key the scene is stored under
pub const SCENE_KEY: &str = "scene";

/// Stable index of a node in its scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("Unknown scene node: {0:?}")]
    UnknownNode(NodeId),

    #[error("Node names cannot be empty")]
    EmptyName,

    #[error("Scene is not available in the check context")]
    Missing,
}

impl From<SceneError> for CheckError {
    fn from(e: SceneError) -> Self {
        CheckError::new(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub name: String,
    pub node_type: String,
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// A flat node table with parent links
///
/// Names are not unique; the full path (`|group|child`) is what checks
/// report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level node
    pub fn add_node(&mut self, name: impl Into<String>, node_type: impl Into<String>) -> NodeId {
        self.push(name.into(), node_type.into(), None)
    }

    /// Add a node under `parent`
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Result<NodeId, SceneError> {
        self.node(parent)?;
        Ok(self.push(name.into(), node_type.into(), Some(parent)))
    }

    fn push(&mut self, name: String, node_type: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode {
            name,
            node_type,
            parent,
            attributes: BTreeMap::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&SceneNode, SceneError> {
        self.nodes.get(id.0).ok_or(SceneError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(id.0).ok_or(SceneError::UnknownNode(id))
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes with the given short name
    pub fn find(&self, name: &str) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, n)| n.name == name)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, n)| n.parent == Some(id))
            .map(|(child, _)| child)
            .collect()
    }

    /// Full path of a node, e.g. `|rig|arm_L`
    pub fn path(&self, id: NodeId) -> Result<String, SceneError> {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            parts.push(node.name.as_str());
            current = node.parent;
        }
        parts.reverse();
        Ok(format!("|{}", parts.join("|")))
    }

    /// Rename a node; returns the previous name
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<String, SceneError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SceneError::EmptyName);
        }
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.name, name))
    }

    pub fn attribute(&self, id: NodeId, attribute: &str) -> Option<&Value> {
        self.get(id)?.attributes.get(attribute)
    }

    /// Set an attribute; returns the previous value
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        attribute: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, SceneError> {
        Ok(self.node_mut(id)?.attributes.insert(attribute.into(), value))
    }

    pub fn remove_attribute(&mut self, id: NodeId, attribute: &str) -> Result<Option<Value>, SceneError> {
        Ok(self.node_mut(id)?.attributes.remove(attribute))
    }
}

/// Store `scene` in the context for the checks to use
pub fn setup_context(ctx: &mut CheckContext, scene: Scene) {
    ctx.extensions_mut().set(SCENE_KEY, scene);
}

/// The scene stored in the context
pub fn current_scene(ctx: &CheckContext) -> Result<&Scene, CheckError> {
    ctx.require::<Scene>(SCENE_KEY)
}

fn scene_mut(ext: &mut Extensions) -> Result<&mut Scene, SceneError> {
    ext.get_mut::<Scene>(SCENE_KEY).ok_or(SceneError::Missing)
}

/// Undoable rename
pub struct Rename {
    node: NodeId,
    name: String,
    previous: Option<String>,
}

impl Rename {
    pub fn new(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            node,
            name: name.into(),
            previous: None,
        }
    }
}

impl Operation for Rename {
    fn do_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError> {
        self.previous = Some(scene_mut(ext)?.rename(self.node, self.name.clone())?);
        Ok(())
    }

    fn undo_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError> {
        if let Some(previous) = &self.previous {
            scene_mut(ext)?.rename(self.node, previous.clone())?;
        }
        Ok(())
    }

    fn label(&self) -> &str {
        "rename"
    }
}

/// Undoable attribute write
pub struct SetAttribute {
    node: NodeId,
    attribute: String,
    value: Value,
    previous: Option<Value>,
}

impl SetAttribute {
    pub fn new(node: NodeId, attribute: impl Into<String>, value: Value) -> Self {
        Self {
            node,
            attribute: attribute.into(),
            value,
            previous: None,
        }
    }
}

impl Operation for SetAttribute {
    fn do_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError> {
        self.previous =
            scene_mut(ext)?.set_attribute(self.node, self.attribute.clone(), self.value.clone())?;
        Ok(())
    }

    fn undo_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError> {
        let scene = scene_mut(ext)?;
        match self.previous.take() {
            Some(previous) => {
                scene.set_attribute(self.node, self.attribute.clone(), previous)?;
            }
            None => {
                scene.remove_attribute(self.node, &self.attribute)?;
            }
        }
        Ok(())
    }

    fn label(&self) -> &str {
        "set attribute"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paths() {
        let mut scene = Scene::new();
        let rig = scene.add_node("rig", "transform");
        let arm = scene.add_child(rig, "arm_L", "joint").unwrap();

        assert_eq!(scene.path(arm).unwrap(), "|rig|arm_L");
        assert_eq!(scene.children(rig), vec![arm]);
        assert!(scene.children(arm).is_empty());
        assert!(scene.add_child(NodeId(9), "x", "mesh").is_err());
    }

    #[test]
    fn test_rename_rejects_empty_name() {
        let mut scene = Scene::new();
        let node = scene.add_node("a", "mesh");
        assert_eq!(scene.rename(node, ""), Err(SceneError::EmptyName));
        assert_eq!(scene.rename(node, "b").unwrap(), "a");
        assert_eq!(scene.find("b"), vec![node]);
    }

    #[test]
    fn test_operations_undo() {
        let mut scene = Scene::new();
        let node = scene.add_node("body", "mesh");
        let mut ctx = CheckContext::new();
        setup_context(&mut ctx, scene);

        ctx.undo_mut().begin_chunk("edit");
        ctx.apply(Rename::new(node, "body_GEO")).unwrap();
        ctx.apply(SetAttribute::new(node, "visibility", json!(false)))
            .unwrap();
        ctx.undo_mut().end_chunk();

        let current = current_scene(&ctx).unwrap();
        assert_eq!(current.get(node).unwrap().name, "body_GEO");
        assert_eq!(current.attribute(node, "visibility"), Some(&json!(false)));

        assert!(ctx.undo_last().unwrap());
        let restored = current_scene(&ctx).unwrap();
        assert_eq!(restored.get(node).unwrap().name, "body");
        assert_eq!(restored.attribute(node, "visibility"), None);
    }

    #[test]
    fn test_missing_scene() {
        let ctx = CheckContext::new();
        assert!(current_scene(&ctx).is_err());
    }
}
