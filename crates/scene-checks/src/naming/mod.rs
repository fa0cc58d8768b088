//! Naming checks
//!
//! Checks and processes that look at node names.

mod convention;
mod normalize;
mod unique_names;

pub use convention::{NamingConvention, NamingConventionConfig};
pub use normalize::NormalizeNames;
pub use unique_names::{UniqueNames, UniqueNamesConfig};
