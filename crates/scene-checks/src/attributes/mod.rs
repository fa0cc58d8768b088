//! Attribute checks

mod required;

pub use required::{RequiredAttributes, RequiredAttributesConfig};
