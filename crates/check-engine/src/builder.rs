//! Fluent builder for workflow descriptions
//!
//! Provides a fluent API for constructing descriptions programmatically.

use crate::description::{EdgeDescription, ProcessDescription, WorkflowDescription};

/// Fluent builder for constructing workflow descriptions
///
/// # Example
///
/// ```ignore
/// let desc = WorkflowBuilder::new("scene-qa")
///     .add_process("normalize", "normalize-names")
///     .add_process("names", "unique-names")
///     .with_label("Unique names")
///     .add_edge("normalize", "names")
///     .build();
/// ```
pub struct WorkflowBuilder {
    name: String,
    processes: Vec<ProcessDescription>,
    edges: Vec<EdgeDescription>,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a process bound to a registered check type
    pub fn add_process(mut self, id: impl Into<String>, check_type: impl Into<String>) -> Self {
        self.processes.push(ProcessDescription {
            id: id.into(),
            check_type: check_type.into(),
            label: None,
            annotation: None,
            config: serde_json::Value::Null,
        });
        self
    }

    /// Set the label of the most recently added process
    ///
    /// Must be called immediately after `add_process`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if let Some(process) = self.processes.last_mut() {
            process.label = Some(label.into());
        }
        self
    }

    /// Set the annotation of the most recently added process
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        if let Some(process) = self.processes.last_mut() {
            process.annotation = Some(annotation.into());
        }
        self
    }

    /// Set the factory config of the most recently added process
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        if let Some(process) = self.processes.last_mut() {
            process.config = config;
        }
        self
    }

    /// Add an ordering edge: `source` runs before `target`
    pub fn add_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(EdgeDescription {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    /// Build the description without validation
    pub fn build(self) -> WorkflowDescription {
        WorkflowDescription {
            name: self.name,
            processes: self.processes,
            edges: self.edges,
        }
    }
}
