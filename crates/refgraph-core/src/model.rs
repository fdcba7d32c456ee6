//! Core data structures for the model graph

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique, stable identifier for a node within one graph snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source region a node was declared in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub source_id: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceSpan {
    pub fn new(
        source_id: impl Into<String>,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        SourceSpan {
            source_id: source_id.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    fn start(&self) -> (u32, u32) {
        (self.start_line, self.start_column)
    }

    fn end(&self) -> (u32, u32) {
        (self.end_line, self.end_column)
    }

    /// Coordinates are 1-based and the span must not end before it starts.
    pub fn is_valid(&self) -> bool {
        !self.source_id.is_empty()
            && self.start_line > 0
            && self.start_column > 0
            && self.start() <= self.end()
    }

    /// Order by start position, then by end position. Source ids are not compared.
    pub fn compare_by_start(&self, other: &SourceSpan) -> Ordering {
        self.start()
            .cmp(&other.start())
            .then_with(|| self.end().cmp(&other.end()))
    }

    /// True if `other` lies entirely within this span.
    pub fn subsumes(&self, other: &SourceSpan) -> bool {
        self.source_id == other.source_id
            && self.start() <= other.start()
            && other.end() <= self.end()
    }

    /// True if this span ends before `other` starts.
    pub fn is_before(&self, other: &SourceSpan) -> bool {
        self.end() < other.start()
    }

    /// True if this span starts after `other` ends.
    pub fn is_after(&self, other: &SourceSpan) -> bool {
        self.start() > other.end()
    }

    /// Intersection test on (line, column) positions, source id ignored.
    pub fn overlaps(&self, other: &SourceSpan) -> bool {
        self.start() <= other.end() && self.end() >= other.start()
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}c{}-{}c{}",
            self.source_id, self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// Primitive property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
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

impl Primitive {
    /// String and date values are carried as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Primitive::String(s)
            | Primitive::Date(s)
            | Primitive::StrictDate(s)
            | Primitive::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Boolean(_) => "Boolean",
            Primitive::Byte(_) => "Byte",
            Primitive::Integer(_) => "Integer",
            Primitive::Float(_) => "Float",
            Primitive::Decimal(_) => "Decimal",
            Primitive::String(_) => "String",
            Primitive::Date(_) => "Date",
            Primitive::StrictDate(_) => "StrictDate",
            Primitive::DateTime(_) => "DateTime",
        }
    }
}

/// A single property value: either another node or a primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Node(NodeId),
    Primitive(Primitive),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Primitive(Primitive::String(s.into()))
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            Value::Primitive(_) => None,
        }
    }

    /// Only `String` primitives count; dates are not usable as keys.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Primitive(Primitive::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<Primitive> for Value {
    fn from(p: Primitive) -> Self {
        Value::Primitive(p)
    }
}

/// A single node in the model graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    /// Path of the classifier, e.g. `meta::pure::metamodel::type::Class`.
    pub classifier: String,
    pub name: Option<String>,
    pub span: Option<SourceSpan>,
    pub properties: BTreeMap<String, Vec<Value>>,
}

impl ModelNode {
    pub fn new(classifier: impl Into<String>) -> Self {
        ModelNode {
            classifier: classifier.into(),
            name: None,
            span: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach primitive values. Node references go through `ModelGraph::push_value`
    /// so the graph can track the edge.
    pub fn with_primitive(mut self, property: impl Into<String>, value: Primitive) -> Self {
        self.properties
            .entry(property.into())
            .or_default()
            .push(Value::Primitive(value));
        self
    }

    pub fn values(&self, property: &str) -> &[Value] {
        self.properties
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Label on a graph edge mirroring a node-valued property slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEdge {
    pub property: String,
    pub position: u32,
}
