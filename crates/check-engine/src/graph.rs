//! Process graph
//!
//! Nodes are kept in declaration order; that order breaks ties whenever
//! the dependency relation leaves several nodes ready at once. Edges are
//! stored on both endpoints so dependencies and dependents are available
//! without a scan.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::check::{CheckProcess, ProcessKind};
use crate::error::{QaError, Result};
use crate::types::{ProcessId, WorkflowId};

/// A node of the process graph
pub struct ProcessNode {
    id: ProcessId,
    kind: ProcessKind,
    workflow: WorkflowId,
    dependencies: Vec<ProcessId>,
    dependents: Vec<ProcessId>,
}

impl ProcessNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ProcessKind {
        &self.kind
    }

    pub fn label(&self) -> &str {
        self.kind.label()
    }

    pub fn as_check(&self) -> Option<&CheckProcess> {
        self.kind.as_check()
    }

    /// The owning workflow
    pub fn workflow(&self) -> WorkflowId {
        self.workflow
    }

    /// Processes that must run before this one, in insertion order
    pub fn dependencies(&self) -> &[ProcessId] {
        &self.dependencies
    }

    /// Processes that depend on this one, in insertion order
    pub fn dependents(&self) -> &[ProcessId] {
        &self.dependents
    }
}

/// Directed acyclic graph of processes belonging to one workflow
pub struct ProcessGraph {
    workflow: WorkflowId,
    nodes: Vec<ProcessNode>,
    index: HashMap<ProcessId, usize>,
}

impl ProcessGraph {
    pub fn new(workflow: WorkflowId) -> Self {
        Self {
            workflow,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a process under a new id
    pub fn add_process(&mut self, id: impl Into<ProcessId>, kind: ProcessKind) -> Result<()> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(QaError::DuplicateProcess(id));
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(ProcessNode {
            id,
            kind,
            workflow: self.workflow,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        });
        Ok(())
    }

    /// Remove a process together with all of its edges
    pub fn remove_process(&mut self, id: &str) -> Result<ProcessNode> {
        let pos = self.position(id)?;
        let node = self.nodes.remove(pos);
        for other in &mut self.nodes {
            other.dependencies.retain(|d| d != id);
            other.dependents.retain(|d| d != id);
        }
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Ok(node)
    }

    /// Make `node` depend on `dependency`
    ///
    /// Fails with [`QaError::Cycle`] when `dependency` already depends on
    /// `node`, directly or transitively, or when both are the same process.
    /// The graph is unchanged on error. Returns `false` when the edge
    /// already existed.
    pub fn add_dependency(&mut self, node: &str, dependency: &str) -> Result<bool> {
        let from = self.position(node)?;
        let to = self.position(dependency)?;
        if from == to || self.depends_on(dependency, node) {
            return Err(QaError::Cycle {
                process: node.to_string(),
                dependency: dependency.to_string(),
            });
        }
        if self.nodes[from].dependencies.iter().any(|d| d == dependency) {
            return Ok(false);
        }
        self.nodes[from].dependencies.push(dependency.to_string());
        self.nodes[to].dependents.push(node.to_string());
        Ok(true)
    }

    /// Remove the edge `node -> dependency`; returns whether it existed
    pub fn remove_dependency(&mut self, node: &str, dependency: &str) -> Result<bool> {
        let from = self.position(node)?;
        let to = self.position(dependency)?;
        let before = self.nodes[from].dependencies.len();
        self.nodes[from].dependencies.retain(|d| d != dependency);
        self.nodes[to].dependents.retain(|d| d != node);
        Ok(self.nodes[from].dependencies.len() != before)
    }

    /// Whether `node` reaches `target` through its dependencies
    pub fn depends_on(&self, node: &str, target: &str) -> bool {
        let mut stack = vec![node];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(n) = self.get(current) else {
                continue;
            };
            for dep in &n.dependencies {
                if dep == target {
                    return true;
                }
                stack.push(dep.as_str());
            }
        }
        false
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| QaError::UnknownProcess(id.to_string()))
    }

    pub fn workflow(&self) -> WorkflowId {
        self.workflow
    }

    pub fn get(&self, id: &str) -> Option<&ProcessNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &ProcessNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.dependencies.len()).sum()
    }

    /// All nodes, dependencies first
    pub fn topological_order(&self) -> Vec<ProcessId> {
        self.order_of(&(0..self.nodes.len()).collect::<HashSet<_>>())
    }

    /// Requested processes plus their transitive dependencies, dependencies first
    pub fn execution_order<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<ProcessId>> {
        let mut closure = HashSet::new();
        let mut stack = Vec::new();
        for id in requested {
            stack.push(self.position(id.as_ref())?);
        }
        while let Some(i) = stack.pop() {
            if closure.insert(i) {
                for dep in &self.nodes[i].dependencies {
                    stack.push(self.position(dep)?);
                }
            }
        }
        Ok(self.order_of(&closure))
    }

    /// Kahn's algorithm over a subset, ties broken by declaration index
    fn order_of(&self, subset: &HashSet<usize>) -> Vec<ProcessId> {
        let mut in_degree: HashMap<usize, usize> = HashMap::new();
        for &i in subset {
            let degree = self.nodes[i]
                .dependencies
                .iter()
                .filter(|d| self.index.get(*d).is_some_and(|j| subset.contains(j)))
                .count();
            in_degree.insert(i, degree);
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(&i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(self.nodes[i].id.clone());
            for dependent in &self.nodes[i].dependents {
                let Some(&j) = self.index.get(dependent) else {
                    continue;
                };
                if let Some(degree) = in_degree.get_mut(&j) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(j));
                    }
                }
            }
        }
        order
    }
}
