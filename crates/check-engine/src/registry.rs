//! Check type registry for dynamic check resolution
//!
//! Maps check-type strings from workflow descriptions to metadata and
//! factories. Crates contribute their check types at link time through
//! `inventory`; [`CheckRegistry::with_builtins`] collects all of them.
//!
//! # Usage
//!
//! ```ignore
//! use check_engine::{CheckRegistry, Workflow, WorkflowDescription};
//!
//! let registry = CheckRegistry::with_builtins();
//! let desc = WorkflowDescription::from_path("qa/scene.json")?;
//! let workflow = Workflow::from_description(&desc, &registry)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::check::{CheckError, CheckProcess, PlainProcess, ProcessKind};
use crate::description::ProcessDescription;
use crate::descriptor::{CheckDescriptor, CheckDescriptorFn, ProcessBody, ProcessFactory};
use crate::error::{QaError, Result};
use crate::validation::ValidationError;

type SharedFactory = Arc<dyn Fn(&serde_json::Value) -> std::result::Result<ProcessBody, CheckError> + Send + Sync>;

/// A registration entry combining metadata with its factory
struct RegistryEntry {
    descriptor: CheckDescriptor,
    factory: SharedFactory,
}

/// Registry of check types with their metadata and factories
///
/// # Composability
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = CheckRegistry::with_builtins();
/// registry.merge(studio_registry); // Add studio-specific checks
/// ```
pub struct CheckRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl CheckRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry holding every check type submitted via `inventory`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in inventory::iter::<CheckDescriptorFn> {
            registry.register((entry.descriptor)(), entry.factory);
        }
        log::debug!("Registered {} built-in check types", registry.entries.len());
        registry
    }

    /// Register a check type with a factory function
    pub fn register(&mut self, descriptor: CheckDescriptor, factory: ProcessFactory) {
        self.register_fn(descriptor, factory);
    }

    /// Register a check type with a factory closure
    pub fn register_fn<F>(&mut self, descriptor: CheckDescriptor, factory: F)
    where
        F: Fn(&serde_json::Value) -> std::result::Result<ProcessBody, CheckError>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert(
            descriptor.check_type.clone(),
            RegistryEntry {
                descriptor,
                factory: Arc::new(factory),
            },
        );
    }

    /// Get metadata for a check type
    pub fn get_descriptor(&self, check_type: &str) -> Option<&CheckDescriptor> {
        self.entries.get(check_type).map(|e| &e.descriptor)
    }

    /// All registered metadata, sorted by check type
    pub fn all_descriptors(&self) -> Vec<&CheckDescriptor> {
        let mut all: Vec<_> = self.entries.values().map(|e| &e.descriptor).collect();
        all.sort_by(|a, b| a.check_type.cmp(&b.check_type));
        all
    }

    /// Check if a check type is registered
    pub fn has_check_type(&self, check_type: &str) -> bool {
        self.entries.contains_key(check_type)
    }

    /// List all registered check type strings, sorted
    pub fn check_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same check_type.
    pub fn merge(&mut self, other: CheckRegistry) {
        self.entries.extend(other.entries);
    }

    /// Create the process described by `desc`
    ///
    /// The description's label and annotation take precedence over the
    /// registered label and description.
    pub fn instantiate(&self, desc: &ProcessDescription) -> Result<ProcessKind> {
        let entry = self.entries.get(&desc.check_type).ok_or_else(|| {
            QaError::InvalidDescription(vec![ValidationError::UnknownCheckType {
                process_id: desc.id.clone(),
                check_type: desc.check_type.clone(),
            }])
        })?;

        let body = (entry.factory)(&desc.config).map_err(|source| QaError::Instantiation {
            process: desc.id.clone(),
            source,
        })?;
        let label = desc
            .label
            .clone()
            .unwrap_or_else(|| entry.descriptor.label.clone());

        Ok(match body {
            ProcessBody::Check(check) => {
                let annotation = desc
                    .annotation
                    .clone()
                    .unwrap_or_else(|| entry.descriptor.description.clone());
                let process = CheckProcess::from_boxed(label, check).with_annotation(annotation);
                if process.implements_fix() != entry.descriptor.implements_fix {
                    log::warn!(
                        "Check type '{}' declares implements_fix={} but its instance reports {}",
                        desc.check_type,
                        entry.descriptor.implements_fix,
                        process.implements_fix()
                    );
                }
                ProcessKind::Check(process)
            }
            ProcessBody::Plain(process) => ProcessKind::Plain(PlainProcess::from_boxed(label, process)),
        })
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Check, Process};
    use crate::context::CheckContext;
    use crate::descriptor::ProcessCategory;
    use crate::result::CheckResult;
    use crate::types::Mode;

    struct Pass;

    impl Check for Pass {
        fn query(&self, _ctx: &mut CheckContext) -> std::result::Result<CheckResult, CheckError> {
            Ok(CheckResult::success())
        }
    }

    struct Noop;

    impl Process for Noop {
        fn execute(&self, _mode: Mode, _ctx: &mut CheckContext) -> std::result::Result<(), CheckError> {
            Ok(())
        }
    }

    fn test_descriptor(check_type: &str) -> CheckDescriptor {
        CheckDescriptor {
            check_type: check_type.to_string(),
            label: format!("Label {}", check_type),
            description: format!("Description {}", check_type),
            implements_fix: false,
            category: ProcessCategory::Check,
        }
    }

    fn pass_factory(_: &serde_json::Value) -> std::result::Result<ProcessBody, CheckError> {
        Ok(ProcessBody::Check(Box::new(Pass)))
    }

    fn process(id: &str, check_type: &str) -> ProcessDescription {
        ProcessDescription {
            id: id.to_string(),
            check_type: check_type.to_string(),
            label: None,
            annotation: None,
            config: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CheckRegistry::new();
        registry.register(test_descriptor("b"), pass_factory);
        registry.register(test_descriptor("a"), pass_factory);

        assert!(registry.has_check_type("a"));
        assert!(!registry.has_check_type("c"));
        assert_eq!(registry.check_types(), vec!["a", "b"]);
        assert_eq!(registry.get_descriptor("a").unwrap().label, "Label a");
        assert_eq!(registry.all_descriptors()[1].check_type, "b");
    }

    #[test]
    fn test_merge_override() {
        let mut base = CheckRegistry::new();
        base.register(test_descriptor("a"), pass_factory);

        let mut other = CheckRegistry::new();
        let mut replaced = test_descriptor("a");
        replaced.label = "Replaced".to_string();
        other.register(replaced, pass_factory);

        base.merge(other);
        assert_eq!(base.get_descriptor("a").unwrap().label, "Replaced");
    }

    #[test]
    fn test_instantiate_uses_registered_defaults() {
        let mut registry = CheckRegistry::new();
        registry.register(test_descriptor("a"), pass_factory);

        let kind = registry.instantiate(&process("p1", "a")).unwrap();
        let check = kind.as_check().unwrap();
        assert_eq!(check.label(), "Label a");
        assert_eq!(check.annotation(), "Description a");

        let mut desc = process("p2", "a");
        desc.label = Some("Custom".to_string());
        let kind = registry.instantiate(&desc).unwrap();
        assert_eq!(kind.label(), "Custom");
    }

    #[test]
    fn test_instantiate_plain_process() {
        let mut registry = CheckRegistry::new();
        let mut descriptor = test_descriptor("normalize");
        descriptor.category = ProcessCategory::Process;
        registry.register_fn(descriptor, |_| Ok(ProcessBody::Plain(Box::new(Noop))));

        let kind = registry.instantiate(&process("n", "normalize")).unwrap();
        assert!(kind.as_check().is_none());
        assert_eq!(kind.label(), "Label normalize");
    }

    #[test]
    fn test_instantiate_unknown_type() {
        let registry = CheckRegistry::new();
        let err = registry.instantiate(&process("p", "missing")).unwrap_err();
        assert!(matches!(err, QaError::InvalidDescription(_)));
    }

    #[test]
    fn test_factory_error_names_process() {
        let mut registry = CheckRegistry::new();
        registry.register_fn(test_descriptor("strict"), |config| {
            if config.get("pattern").is_none() {
                return Err(CheckError::new("missing 'pattern'"));
            }
            Ok(ProcessBody::Check(Box::new(Pass)))
        });

        match registry.instantiate(&process("naming", "strict")) {
            Err(QaError::Instantiation { process, source }) => {
                assert_eq!(process, "naming");
                assert!(source.message().contains("pattern"));
            }
            _ => panic!("Expected an instantiation error"),
        }
    }
}
