//! Hierarchy checks

mod empty_groups;

pub use empty_groups::{EmptyGroups, EmptyGroupsConfig};
