//! Stable reference ids for model graph nodes

pub mod class_info;
pub mod containing;
pub mod error;
pub mod generator;
pub mod graph_path;
pub mod provider;

#[cfg(test)]
pub mod tests;

pub use class_info::{ClassInfo, ClassInfoCache, PropertyInfo};
pub use containing::{ContainingElementIndex, ContainingElementIndexBuilder};
pub use error::{ReferenceError, Result};
pub use generator::ReferenceIdGenerator;
pub use graph_path::{compare_strings, is_id_identifier, is_id_start_path, Edge, GraphPath};
pub use provider::{ReferenceIdProvider, ReferenceIdResolver};
