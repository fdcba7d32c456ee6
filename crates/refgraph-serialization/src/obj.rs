//! Serializable object form of graph nodes
//!
//! An `Obj` is a node detached from the graph: references to other nodes are
//! replaced by (classifier, identifier) pairs, or by (enumeration, name) for
//! enum values.

use std::collections::{BTreeMap, HashMap};

use refgraph_core::{m3, ModelGraph, NodeId, Primitive, SourceSpan, Value};

use crate::error::{Result, SerializationError};

#[derive(Debug, Clone, PartialEq)]
pub enum RValue {
    Primitive(Primitive),
    ObjRef { classifier: String, identifier: String },
    EnumRef { enumeration: String, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValues {
    pub name: String,
    pub values: Vec<RValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Obj {
    pub classifier: String,
    pub identifier: String,
    /// The node's name. `ObjBuilder` falls back to the identifier for nameless
    /// nodes, so only objs assembled elsewhere carry `None`.
    pub name: Option<String>,
    pub source_info: Option<SourceSpan>,
    pub properties: Vec<PropertyValues>,
    pub enum_value: bool,
}

impl Obj {
    pub fn property(&self, name: &str) -> Option<&[RValue]> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.values.as_slice())
    }

    /// Classifier, identifier, and name must all be present and non-empty.
    pub fn validate_fully_defined(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.classifier.is_empty() {
            missing.push("classifier");
        }
        if self.identifier.is_empty() {
            missing.push("identifier");
        }
        if self.name.as_deref().is_none_or(str::is_empty) {
            missing.push("name");
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(SerializationError::ObjNotFullyDefined(format!(
            "{}/{} is missing {}",
            self.classifier,
            self.identifier,
            missing.join(" and ")
        )))
    }
}

// ── Identifiers ─────────────────────────────────────────

/// Per-classifier identifiers for a set of nodes.
///
/// Packageable elements use their user path and enum values their name.
/// Other spanned nodes use `<classifier>@<span>`; the rest use
/// `<classifier>#<node id>`. When several such nodes of one classifier share
/// an identifier, all but the first (by node id) get a `~<n>` suffix.
/// Element paths are never suffixed, so duplicate elements still clash.
#[derive(Debug, Default)]
pub struct Identifiers {
    ids: HashMap<NodeId, String>,
}

impl Identifiers {
    pub fn build(graph: &ModelGraph, nodes: &[NodeId]) -> Self {
        let mut ids = HashMap::with_capacity(nodes.len());
        let mut derived: BTreeMap<(&str, String), Vec<NodeId>> = BTreeMap::new();
        for &node in nodes {
            let Some(classifier) = graph.classifier(node) else {
                continue;
            };
            if let Some(id) = fixed_identifier(graph, node) {
                ids.insert(node, id);
                continue;
            }
            let id = match graph.span(node) {
                Some(span) => format!("{classifier}@{span}"),
                None => format!("{classifier}{node}"),
            };
            derived.entry((classifier, id)).or_default().push(node);
        }
        for ((_, id), mut group) in derived {
            group.sort();
            group.dedup();
            for (i, node) in group.into_iter().enumerate() {
                let id = if i == 0 { id.clone() } else { format!("{id}~{i}") };
                ids.insert(node, id);
            }
        }
        Identifiers { ids }
    }

    pub fn get(&self, node: NodeId) -> Option<&str> {
        self.ids.get(&node).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn fixed_identifier(graph: &ModelGraph, node: NodeId) -> Option<String> {
    if graph.is_enum_value(node) {
        return enum_name(graph, node);
    }
    if graph.is_packageable_element(node) {
        return graph.element_path(node);
    }
    None
}

fn enum_name(graph: &ModelGraph, node: NodeId) -> Option<String> {
    graph
        .name(node)
        .or_else(|| graph.value_string(node, m3::NAME))
        .map(str::to_string)
}

// ── Conversion ──────────────────────────────────────────

/// Converts graph nodes to `Obj`s using precomputed identifiers.
pub struct ObjBuilder<'g> {
    graph: &'g ModelGraph,
    identifiers: &'g Identifiers,
}

impl<'g> ObjBuilder<'g> {
    pub fn new(graph: &'g ModelGraph, identifiers: &'g Identifiers) -> Self {
        ObjBuilder { graph, identifiers }
    }

    pub fn build(&self, node: NodeId) -> Result<Obj> {
        let model = self
            .graph
            .node(node)
            .ok_or_else(|| SerializationError::UnknownInstance {
                classifier: String::new(),
                identifier: node.to_string(),
            })?;
        let identifier = self.identifier(node, &model.classifier)?;
        let enum_value = self.graph.is_enum_value(node);
        let name = model.name.clone().or_else(|| Some(identifier.clone()));
        let mut properties = Vec::with_capacity(model.properties.len());
        for (property, values) in &model.properties {
            let values = values
                .iter()
                .map(|v| self.value(v))
                .collect::<Result<Vec<_>>>()?;
            properties.push(PropertyValues {
                name: property.clone(),
                values,
            });
        }
        Ok(Obj {
            classifier: model.classifier.clone(),
            identifier,
            name,
            source_info: model.span.clone(),
            properties,
            enum_value,
        })
    }

    fn value(&self, value: &Value) -> Result<RValue> {
        let target = match value {
            Value::Primitive(p) => return Ok(RValue::Primitive(p.clone())),
            Value::Node(target) => *target,
        };
        let classifier = self.graph.classifier(target).unwrap_or_default().to_string();
        if self.graph.is_enum_value(target) {
            let name = enum_name(self.graph, target).ok_or_else(|| {
                SerializationError::ObjNotFullyDefined(format!("enum value {target} of {classifier} has no name"))
            })?;
            return Ok(RValue::EnumRef {
                enumeration: classifier,
                name,
            });
        }
        let identifier = self.identifier(target, &classifier)?;
        Ok(RValue::ObjRef { classifier, identifier })
    }

    fn identifier(&self, node: NodeId, classifier: &str) -> Result<String> {
        self.identifiers
            .get(node)
            .map(str::to_string)
            .ok_or_else(|| SerializationError::UnknownInstance {
                classifier: classifier.to_string(),
                identifier: node.to_string(),
            })
    }
}
