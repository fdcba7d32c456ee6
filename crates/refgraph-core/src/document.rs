//! JSON model documents
//!
//! A document lists class descriptors and node entries. Entries reference each
//! other by key; entries with a `package` become packageable elements.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::graph::ModelGraph;
use crate::model::{ModelNode, NodeId, Primitive, SourceSpan, Value};
use crate::types::{ClassDescriptor, TypeRegistry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub classes: Vec<ClassDescriptor>,
    #[serde(default)]
    pub elements: Vec<NodeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub key: String,
    pub classifier: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub span: Option<SourceSpan>,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<EntryValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryValue {
    Ref(String),
    Boolean(bool),
    Byte(u8),
    Integer(i64),
    Float(f64),
    Decimal(String),
    String(String),
    Date(String),
    StrictDate(String),
    DateTime(String),
}

impl EntryValue {
    fn resolve(&self, keys: &BTreeMap<String, NodeId>, from: &str) -> Result<Value> {
        let primitive = match self {
            EntryValue::Ref(key) => {
                return keys.get(key).map(|id| Value::Node(*id)).ok_or_else(|| {
                    CoreError::UnknownNodeKey {
                        key: key.clone(),
                        from: from.to_string(),
                    }
                });
            }
            EntryValue::Boolean(b) => Primitive::Boolean(*b),
            EntryValue::Byte(b) => Primitive::Byte(*b),
            EntryValue::Integer(i) => Primitive::Integer(*i),
            EntryValue::Float(f) => Primitive::Float(*f),
            EntryValue::Decimal(s) => Primitive::Decimal(s.clone()),
            EntryValue::String(s) => Primitive::String(s.clone()),
            EntryValue::Date(s) => Primitive::Date(s.clone()),
            EntryValue::StrictDate(s) => Primitive::StrictDate(s.clone()),
            EntryValue::DateTime(s) => Primitive::DateTime(s.clone()),
        };
        Ok(Value::Primitive(primitive))
    }
}

/// A loaded graph plus the document keys of its nodes.
#[derive(Debug)]
pub struct LoadedModel {
    pub graph: ModelGraph,
    pub keys: BTreeMap<String, NodeId>,
}

impl LoadedModel {
    pub fn node(&self, key: &str) -> Option<NodeId> {
        self.keys.get(key).copied()
    }
}

impl ModelDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Build a graph: metamodel classes, then document classes, then nodes in
    /// two passes so entries can reference each other in any order.
    pub fn into_graph(self) -> Result<LoadedModel> {
        let mut types = TypeRegistry::with_m3();
        for class in self.classes {
            types.register(class);
        }
        let mut graph = ModelGraph::new(types);

        let mut keys = BTreeMap::new();
        for entry in &self.elements {
            if keys.contains_key(&entry.key) {
                return Err(CoreError::DuplicateNodeKey(entry.key.clone()));
            }
            let mut node = ModelNode::new(entry.classifier.clone());
            node.name = entry.name.clone();
            node.span = entry.span.clone();
            let id = match &entry.package {
                Some(package) => graph.add_element(package, node)?,
                None => graph.add_node(node),
            };
            keys.insert(entry.key.clone(), id);
        }

        for entry in &self.elements {
            let id = keys[&entry.key];
            for (property, values) in &entry.properties {
                graph.clear_property(id, property)?;
                for value in values {
                    let value = value.resolve(&keys, &entry.key)?;
                    graph.push_value(id, property, value)?;
                }
            }
        }

        tracing::debug!(
            "Loaded model document: {} entries, {} nodes, {} edges",
            keys.len(),
            graph.node_count(),
            graph.edge_count()
        );
        Ok(LoadedModel { graph, keys })
    }
}
