//! Scene Checks
//!
//! An in-memory scene object store and the built-in checks that run
//! against it. Each check type registers itself with `inventory`, so
//! `CheckRegistry::with_builtins()` picks all of them up.
//!
//! # Categories
//!
//! - **Naming**: unique names, naming convention, name normalization
//! - **Hierarchy**: empty groups
//! - **Attributes**: required attribute values

mod config;

pub mod attributes;
pub mod hierarchy;
pub mod naming;
pub mod scene;

pub use attributes::*;
pub use hierarchy::*;
pub use naming::*;
pub use scene::{current_scene, setup_context, NodeId, Scene, SceneError, SceneNode, SCENE_KEY};

#[cfg(test)]
mod tests {
    use check_engine::{
        CheckContext, CheckRegistry, Mode, ProcessCategory, RunOptions, RunState, Workflow,
        WorkflowBuilder,
    };
    use serde_json::json;

    use super::*;

    #[test]
    fn test_inventory_collects_all_builtins() {
        let registry = CheckRegistry::with_builtins();
        assert_eq!(
            registry.check_types(),
            vec![
                "empty-groups",
                "naming-convention",
                "normalize-names",
                "required-attributes",
                "unique-names"
            ]
        );
        assert_eq!(
            registry.get_descriptor("normalize-names").unwrap().category,
            ProcessCategory::Process
        );
        assert!(!registry.get_descriptor("empty-groups").unwrap().implements_fix);
    }

    fn scene_qa() -> Workflow {
        let desc = WorkflowBuilder::new("scene-qa")
            .add_process("normalize", "normalize-names")
            .add_process("names", "unique-names")
            .add_process("convention", "naming-convention")
            .with_config(json!({"suffixes": {"mesh": "_GEO"}}))
            .add_process("groups", "empty-groups")
            .add_edge("normalize", "names")
            .add_edge("names", "convention")
            .build();
        Workflow::from_description(&desc, &CheckRegistry::with_builtins()).unwrap()
    }

    fn context() -> CheckContext {
        let mut scene = Scene::new();
        scene.add_node("body", "mesh");
        scene.add_node("body ", "mesh");
        scene.add_node("props", "transform");
        let mut ctx = CheckContext::new();
        setup_context(&mut ctx, scene);
        ctx
    }

    #[test]
    fn test_dependencies_run_before_requested_check() {
        let mut wf = scene_qa();
        let mut ctx = context();
        let convention = wf.handle("convention").unwrap();

        let results = wf
            .run_checks(&[convention.clone()], Mode::Query, &RunOptions::default(), &mut ctx)
            .unwrap();

        // normalize and names ran as dependencies, groups did not run
        let names = wf.handle("names").unwrap();
        assert!(wf.has_cache(&names));
        assert_eq!(wf.check_state(&names), RunState::Failed);
        assert!(!wf.has_cache(&wf.handle("groups").unwrap()));
        assert_eq!(results[0].1.failed_items(), ["|body", "|body"]);
        // the trailing space was normalized away before the names were compared
        assert_eq!(wf.get_cache(&names).unwrap().failed_items(), ["|body", "|body"]);
    }

    #[test]
    fn test_fix_then_requery_through_workflow() {
        let mut wf = scene_qa();
        let mut ctx = context();
        let names = wf.handle("names").unwrap();

        let fix = wf
            .run_checks(&[names.clone()], Mode::Fix, &RunOptions::forced(), &mut ctx)
            .unwrap();
        assert_eq!(fix[0].1.fixed_items(), ["|body"]);

        let requery = wf
            .run_checks(&[names.clone()], Mode::Query, &RunOptions::forced(), &mut ctx)
            .unwrap();
        assert!(requery[0].1.is_successful());

        let scene = current_scene(&ctx).unwrap();
        assert_eq!(scene.find("body").len(), 1);
        assert_eq!(scene.find("body_1").len(), 1);
    }

    #[test]
    fn test_fix_on_query_only_check_is_rejected() {
        let mut wf = scene_qa();
        let groups = wf.handle("groups").unwrap();
        let err = wf
            .run_checks(&[groups], Mode::Fix, &RunOptions::default(), &mut context())
            .unwrap_err();
        assert!(matches!(err, check_engine::QaError::UnsupportedMode { .. }));
    }
}
