//! Workflow description validation
//!
//! Validates process ids, check types and edge endpoints, and detects
//! cycles. All problems are collected, not just the first.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::description::WorkflowDescription;
use crate::registry::CheckRegistry;

/// Validation error with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Cycle detected in the graph
    CycleDetected,
    /// Two processes share an id
    DuplicateProcess { process_id: String },
    /// A process has a check type the registry does not know
    UnknownCheckType {
        process_id: String,
        check_type: String,
    },
    /// An edge references a non-existent process
    UnknownProcess { process_id: String },
    /// An edge connects a process to itself
    SelfDependency { process_id: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Cycle detected in workflow"),
            Self::DuplicateProcess { process_id } => {
                write!(f, "Process id '{}' is used more than once", process_id)
            }
            Self::UnknownCheckType {
                process_id,
                check_type,
            } => {
                write!(
                    f,
                    "Unknown check type '{}' for process '{}'",
                    check_type, process_id
                )
            }
            Self::UnknownProcess { process_id } => {
                write!(f, "Edge references unknown process '{}'", process_id)
            }
            Self::SelfDependency { process_id } => {
                write!(f, "Process '{}' depends on itself", process_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a workflow description
///
/// Pass a registry to also check that every check type is registered.
pub fn validate_description(
    desc: &WorkflowDescription,
    registry: Option<&CheckRegistry>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_process_ids(desc, &mut errors);
    validate_edge_references(desc, &mut errors);
    detect_cycles(desc, &mut errors);

    if let Some(reg) = registry {
        validate_check_types(desc, reg, &mut errors);
    }

    errors
}

fn validate_process_ids(desc: &WorkflowDescription, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for process in &desc.processes {
        if !seen.insert(process.id.as_str()) {
            errors.push(ValidationError::DuplicateProcess {
                process_id: process.id.clone(),
            });
        }
    }
}

/// Check that all edge endpoints exist
fn validate_edge_references(desc: &WorkflowDescription, errors: &mut Vec<ValidationError>) {
    let ids: HashSet<&str> = desc.processes.iter().map(|p| p.id.as_str()).collect();
    let mut reported = HashSet::new();

    for edge in &desc.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !ids.contains(endpoint.as_str()) && reported.insert(endpoint.as_str()) {
                errors.push(ValidationError::UnknownProcess {
                    process_id: endpoint.clone(),
                });
            }
        }
        if edge.source == edge.target {
            errors.push(ValidationError::SelfDependency {
                process_id: edge.source.clone(),
            });
        }
    }
}

/// Detect cycles using Kahn's algorithm (topological sort)
///
/// Edges with unknown endpoints are ignored here; they are reported by
/// the reference check.
fn detect_cycles(desc: &WorkflowDescription, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for process in &desc.processes {
        in_degree.insert(&process.id, 0);
    }
    let edges: Vec<_> = desc
        .edges
        .iter()
        .filter(|e| {
            e.source != e.target
                && in_degree.contains_key(e.source.as_str())
                && in_degree.contains_key(e.target.as_str())
        })
        .collect();
    for edge in &edges {
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(process_id) = queue.pop_front() {
        visited += 1;
        for edge in &edges {
            if edge.source == process_id {
                if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(&edge.target);
                    }
                }
            }
        }
    }

    if visited < in_degree.len() {
        errors.push(ValidationError::CycleDetected);
    }
}

/// Check that all processes have known check types
fn validate_check_types(
    desc: &WorkflowDescription,
    registry: &CheckRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for process in &desc.processes {
        if !registry.has_check_type(&process.check_type) {
            errors.push(ValidationError::UnknownCheckType {
                process_id: process.id.clone(),
                check_type: process.check_type.clone(),
            });
        }
    }
}
