//! Check descriptor trait and metadata types
//!
//! This module provides the `CheckDescribe` trait that lets a check type
//! self-describe its metadata (label, description, fix support), and the
//! link-time registration record that pairs the metadata with a factory.
//!
//! The check implementation defines both its behavior AND its metadata.

use serde::{Deserialize, Serialize};

use crate::check::{Check, CheckError, Process};

/// Trait for check types that can describe their metadata
///
/// # Example
///
/// ```ignore
/// impl CheckDescribe for UniqueNames {
///     fn descriptor() -> CheckDescriptor {
///         CheckDescriptor {
///             check_type: "unique-names".to_string(),
///             label: "Unique names".to_string(),
///             description: "No two nodes share a name".to_string(),
///             implements_fix: true,
///             category: ProcessCategory::Check,
///         }
///     }
/// }
/// ```
pub trait CheckDescribe {
    /// Get the static metadata for this check type
    fn descriptor() -> CheckDescriptor
    where
        Self: Sized;
}

/// Whether a registered type produces a check or a plain process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCategory {
    Check,
    Process,
}

/// Complete metadata for a check type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDescriptor {
    /// Unique type identifier (e.g., "unique-names")
    pub check_type: String,
    /// Human-readable label
    pub label: String,
    /// Description shown as the check's annotation
    pub description: String,
    /// Whether instances offer a fix mode
    pub implements_fix: bool,
    pub category: ProcessCategory,
}

/// Body produced by a factory, before it is labelled
pub enum ProcessBody {
    Check(Box<dyn Check>),
    Plain(Box<dyn Process>),
}

/// Builds a process body from the `config` of its description
pub type ProcessFactory = fn(&serde_json::Value) -> Result<ProcessBody, CheckError>;

/// Link-time registration of a check type
///
/// Both fields are function pointers so the record can be built in a
/// `static` by `inventory::submit!`.
///
/// # Example
///
/// ```ignore
/// inventory::submit!(check_engine::CheckDescriptorFn {
///     descriptor: UniqueNames::descriptor,
///     factory: UniqueNames::create,
/// });
/// ```
pub struct CheckDescriptorFn {
    pub descriptor: fn() -> CheckDescriptor,
    pub factory: ProcessFactory,
}

inventory::collect!(CheckDescriptorFn);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = CheckDescriptor {
            check_type: "unique-names".to_string(),
            label: "Unique names".to_string(),
            description: "No two nodes share a name".to_string(),
            implements_fix: true,
            category: ProcessCategory::Check,
        };

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("unique-names"));
        assert!(json.contains("checkType")); // camelCase
        assert!(json.contains("implementsFix"));
    }
}
