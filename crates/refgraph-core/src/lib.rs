//! Refgraph Core — model graph, classifier registry, and model loading

pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod m3;
pub mod model;
pub mod types;


#[cfg(test)]
pub mod test_utils;

pub use config::{Config, ReferenceConfig, SerializationConfig};
pub use document::{EntryValue, LoadedModel, ModelDocument, NodeEntry};
pub use error::{CoreError, Result};
pub use graph::ModelGraph;
pub use model::{ModelNode, NodeId, Primitive, PropertyEdge, SourceSpan, Value};
pub use types::{ClassDescriptor, GenericType, Multiplicity, PropertyDescriptor, TypeRegistry};
