//! Declarative workflow descriptions
//!
//! A description is the on-disk form of a workflow: its processes, the
//! check type each one is bound to, and the ordering edges between them.
//!
//! ```json
//! {
//!   "name": "scene-qa",
//!   "processes": [
//!     { "id": "normalize", "checkType": "normalize-names" },
//!     { "id": "names", "checkType": "unique-names", "label": "Unique names" }
//!   ],
//!   "edges": [ { "source": "normalize", "target": "names" } ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Serializable workflow description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDescription {
    pub name: String,
    #[serde(default)]
    pub processes: Vec<ProcessDescription>,
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

/// One process of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescription {
    /// Id unique within the workflow
    pub id: String,
    /// Registered check type the process is instantiated from
    pub check_type: String,
    /// Display label; the registry label is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Annotation text; the registry description is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Parameters passed to the check factory
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

/// Ordering edge: `source` runs before `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub source: String,
    pub target: String,
}

impl WorkflowDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a description file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_description() {
        let desc = WorkflowDescription::from_json(
            r#"{
                "name": "scene-qa",
                "processes": [
                    { "id": "normalize", "checkType": "normalize-names" },
                    { "id": "names", "checkType": "unique-names", "label": "Unique names",
                      "config": { "ignore": ["persp"] } }
                ],
                "edges": [ { "source": "normalize", "target": "names" } ]
            }"#,
        )
        .unwrap();

        assert_eq!(desc.name, "scene-qa");
        assert_eq!(desc.processes.len(), 2);
        assert_eq!(desc.processes[0].label, None);
        assert!(desc.processes[0].config.is_null());
        assert_eq!(desc.processes[1].config["ignore"][0], "persp");
        assert_eq!(desc.edges[0].target, "names");
    }

    #[test]
    fn test_json_uses_camel_case() {
        let desc = WorkflowDescription {
            name: "wf".to_string(),
            processes: vec![ProcessDescription {
                id: "a".to_string(),
                check_type: "unique-names".to_string(),
                label: None,
                annotation: None,
                config: serde_json::Value::Null,
            }],
            edges: vec![],
        };
        let json = desc.to_json().unwrap();
        assert!(json.contains("checkType"));
        assert!(!json.contains("config"));
        assert_eq!(WorkflowDescription::from_json(&json).unwrap(), desc);
    }

    #[test]
    fn test_malformed_json_is_a_serialization_error() {
        let err = WorkflowDescription::from_json("{ \"processes\": 3 }").unwrap_err();
        assert!(matches!(err, crate::error::QaError::Serialization(_)));
    }
}
