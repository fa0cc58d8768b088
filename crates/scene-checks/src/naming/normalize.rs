//! Name normalization process
//!
//! Trims node names and replaces inner whitespace with underscores so the
//! naming checks downstream compare clean names. Runs the same way in both
//! modes.

use check_engine::{
    CheckContext, CheckDescribe, CheckDescriptor, CheckError, Mode, Process, ProcessBody,
    ProcessCategory,
};

use crate::scene::{current_scene, Rename};

pub struct NormalizeNames;

impl NormalizeNames {
    pub fn create(_config: &serde_json::Value) -> Result<ProcessBody, CheckError> {
        Ok(ProcessBody::Plain(Box::new(Self)))
    }

    fn normalize(name: &str) -> String {
        name.split_whitespace().collect::<Vec<_>>().join("_")
    }
}

impl CheckDescribe for NormalizeNames {
    fn descriptor() -> CheckDescriptor {
        CheckDescriptor {
            check_type: "normalize-names".to_string(),
            label: "Normalize names".to_string(),
            description: "Trim names and replace whitespace with underscores".to_string(),
            implements_fix: false,
            category: ProcessCategory::Process,
        }
    }
}

inventory::submit!(check_engine::CheckDescriptorFn {
    descriptor: NormalizeNames::descriptor,
    factory: NormalizeNames::create,
});

impl Process for NormalizeNames {
    fn execute(&self, mode: Mode, ctx: &mut CheckContext) -> Result<(), CheckError> {
        let renames: Vec<_> = current_scene(ctx)?
            .iter()
            .filter_map(|(id, node)| {
                let normalized = Self::normalize(&node.name);
                (!normalized.is_empty() && normalized != node.name).then_some((id, normalized))
            })
            .collect();

        log::debug!("Normalizing {} names ({} mode)", renames.len(), mode);
        for (id, name) in renames {
            ctx.apply(Rename::new(id, name))?;
        }
        Ok(())
    }
}
