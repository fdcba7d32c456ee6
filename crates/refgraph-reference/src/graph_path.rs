//! Graph paths: edge sequences from a packageable element to an interior node
//!
//! The description of a path is its reference id:
//! `my::pkg::Foo.properties[name=bar].genericType.typeArguments[0]`.
//! Key values escape `\` and `]` with a backslash.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use refgraph_core::{ModelGraph, NodeId, Value};

use crate::error::{ReferenceError, Result};

/// One step of a graph path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Edge {
    ToOne {
        property: String,
    },
    ToManyByIndex {
        property: String,
        index: usize,
    },
    ToManyByKey {
        property: String,
        key_property: String,
        key: String,
    },
}

impl Edge {
    pub fn to_one(property: impl Into<String>) -> Self {
        Edge::ToOne {
            property: property.into(),
        }
    }

    pub fn at_index(property: impl Into<String>, index: usize) -> Self {
        Edge::ToManyByIndex {
            property: property.into(),
            index,
        }
    }

    pub fn with_key(property: impl Into<String>, key_property: impl Into<String>, key: impl Into<String>) -> Self {
        Edge::ToManyByKey {
            property: property.into(),
            key_property: key_property.into(),
            key: key.into(),
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Edge::ToOne { property }
            | Edge::ToManyByIndex { property, .. }
            | Edge::ToManyByKey { property, .. } => property,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Edge::ToOne { .. } => 0,
            Edge::ToManyByIndex { .. } => 1,
            Edge::ToManyByKey { .. } => 2,
        }
    }

    fn write_description(&self, out: &mut String) {
        out.push('.');
        out.push_str(self.property());
        match self {
            Edge::ToOne { .. } => {}
            Edge::ToManyByIndex { index, .. } => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
            Edge::ToManyByKey { key_property, key, .. } => {
                out.push('[');
                out.push_str(key_property);
                out.push('=');
                for c in key.chars() {
                    if c == '\\' || c == ']' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push(']');
            }
        }
    }
}

/// Canonical edge order: to-one before to-many; among to-many edges, by-index
/// before by-key. Within a kind, names and keys compare by `compare_strings`.
impl Ord for Edge {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Edge::ToOne { property: p1 }, Edge::ToOne { property: p2 }) => compare_strings(p1, p2),
            (
                Edge::ToManyByIndex { property: p1, index: i1 },
                Edge::ToManyByIndex { property: p2, index: i2 },
            ) => compare_strings(p1, p2).then_with(|| i1.cmp(i2)),
            (
                Edge::ToManyByKey {
                    property: p1,
                    key_property: k1,
                    key: v1,
                },
                Edge::ToManyByKey {
                    property: p2,
                    key_property: k2,
                    key: v2,
                },
            ) => compare_strings(p1, p2)
                .then_with(|| compare_strings(k1, k2))
                .then_with(|| compare_strings(v1, v2)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shorter strings first, then lexicographic by UTF-16 code unit.
pub fn compare_strings(a: &str, b: &str) -> Ordering {
    a.encode_utf16()
        .count()
        .cmp(&b.encode_utf16().count())
        .then_with(|| a.encode_utf16().cmp(b.encode_utf16()))
}

/// Whether `name` can appear as a property or key name in a reference id.
pub fn is_id_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(identifier_start) && chars.all(identifier_part)
}

/// Whether `path` can appear as the start element path of a reference id.
pub fn is_id_start_path(path: &str) -> bool {
    !path.is_empty()
        && !path.split("::").any(str::is_empty)
        && !path.chars().any(|c| c == '.' || c == '[' || c == ']' || c.is_whitespace())
}

fn identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// A start element path plus edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphPath {
    start: String,
    edges: Vec<Edge>,
}

impl GraphPath {
    pub fn new(start: impl Into<String>) -> Self {
        GraphPath {
            start: start.into(),
            edges: Vec::new(),
        }
    }

    pub fn start_path(&self) -> &str {
        &self.start
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// A new path with `edge` appended.
    pub fn with_edge(&self, edge: Edge) -> GraphPath {
        let mut edges = Vec::with_capacity(self.edges.len() + 1);
        edges.extend_from_slice(&self.edges);
        edges.push(edge);
        GraphPath {
            start: self.start.clone(),
            edges,
        }
    }

    pub fn push(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn description(&self) -> String {
        let mut out = String::with_capacity(self.start.len() + 16 * self.edges.len());
        out.push_str(&self.start);
        for edge in &self.edges {
            edge.write_description(&mut out);
        }
        out
    }

    /// Parse a description back into a path.
    pub fn parse(description: &str) -> Result<GraphPath> {
        Parser::new(description).parse()
    }

    /// Walk the path against the graph, starting from the element named by
    /// the start path.
    pub fn resolve(&self, graph: &ModelGraph) -> Result<NodeId> {
        let mut current = graph.element_by_path(&self.start).ok_or_else(|| {
            self.unresolvable(format!("could not find element '{}'", self.start))
        })?;
        for (i, edge) in self.edges.iter().enumerate() {
            current = self
                .step(graph, current, edge)
                .map_err(|reason| {
                    let prefix = GraphPath {
                        start: self.start.clone(),
                        edges: self.edges[..=i].to_vec(),
                    };
                    self.unresolvable(format!("error accessing {}: {}", prefix.description(), reason))
                })?;
        }
        Ok(current)
    }

    fn step(&self, graph: &ModelGraph, node: NodeId, edge: &Edge) -> std::result::Result<NodeId, String> {
        let property = edge.property();
        let values = graph.values(node, property);
        let value = match edge {
            Edge::ToOne { .. } => match values {
                [] => return Err(format!("no value for property '{property}'")),
                [value] => value,
                _ => return Err(format!("property '{property}' has {} values", values.len())),
            },
            Edge::ToManyByIndex { index, .. } => values.get(*index).ok_or_else(|| {
                format!("index {index} out of bounds for property '{property}' with {} values", values.len())
            })?,
            Edge::ToManyByKey { key_property, key, .. } => values
                .iter()
                .find(|v| {
                    v.as_node()
                        .is_some_and(|n| graph.value_string(n, key_property) == Some(key.as_str()))
                })
                .ok_or_else(|| format!("no value with {key_property}='{key}' for property '{property}'"))?,
        };
        match value {
            Value::Node(id) => Ok(*id),
            Value::Primitive(p) => Err(format!("value is a primitive {}", p.type_name())),
        }
    }

    fn unresolvable(&self, reason: String) -> ReferenceError {
        ReferenceError::UnresolvableReferenceId {
            id: self.description(),
            reason,
        }
    }
}

/// Shorter paths first, then edge by edge. The start path breaks any remaining tie.
impl Ord for GraphPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.edges
            .len()
            .cmp(&other.edges.len())
            .then_with(|| self.edges.cmp(&other.edges))
            .then_with(|| compare_strings(&self.start, &other.start))
    }
}

impl PartialOrd for GraphPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GraphPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl FromStr for GraphPath {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self> {
        GraphPath::parse(s)
    }
}

// ── Parsing ─────────────────────────────────────────────

struct Parser<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Parser {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn parse(mut self) -> Result<GraphPath> {
        let start = self.start_path()?;
        let mut path = GraphPath::new(start);
        while let Some((pos, c)) = self.chars.next() {
            if c != '.' {
                return Err(self.error(format!("expected '.' at offset {pos}, found '{c}'")));
            }
            let property = self.identifier("property name")?;
            let edge = if self.eat('[') {
                self.bracket(property)?
            } else {
                Edge::ToOne { property }
            };
            path.push(edge);
        }
        Ok(path)
    }

    fn start_path(&mut self) -> Result<String> {
        let mut start = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '.' {
                break;
            }
            if c == '[' || c == ']' || c.is_whitespace() {
                return Err(self.error(format!("invalid character '{c}' in element path")));
            }
            start.push(c);
            self.chars.next();
        }
        if start.is_empty() {
            return Err(self.error("missing element path".to_string()));
        }
        if start.split("::").any(str::is_empty) {
            return Err(self.error(format!("invalid element path '{start}'")));
        }
        Ok(start)
    }

    fn identifier(&mut self, what: &str) -> Result<String> {
        let mut ident = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            let valid = if ident.is_empty() { identifier_start(c) } else { identifier_part(c) };
            if !valid {
                break;
            }
            ident.push(c);
            self.chars.next();
        }
        if ident.is_empty() {
            return Err(self.error(format!("missing {what}")));
        }
        Ok(ident)
    }

    fn bracket(&mut self, property: String) -> Result<Edge> {
        if self.chars.peek().is_some_and(|(_, c)| c.is_ascii_digit()) {
            let mut digits = String::new();
            while let Some(&(_, c)) = self.chars.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                digits.push(c);
                self.chars.next();
            }
            if !self.eat(']') {
                return Err(self.error(format!("unterminated index for property '{property}'")));
            }
            let index = digits
                .parse::<usize>()
                .map_err(|e| self.error(format!("invalid index '{digits}': {e}")))?;
            return Ok(Edge::ToManyByIndex { property, index });
        }

        let key_property = self.identifier("key property name")?;
        if !self.eat('=') {
            return Err(self.error(format!("expected '=' after key property '{key_property}'")));
        }
        let mut key = String::new();
        loop {
            match self.chars.next() {
                None => return Err(self.error(format!("unterminated key for property '{property}'"))),
                Some((_, ']')) => break,
                Some((pos, '\\')) => match self.chars.next() {
                    Some((_, c @ ('\\' | ']'))) => key.push(c),
                    Some((_, c)) => return Err(self.error(format!("invalid escape '\\{c}' at offset {pos}"))),
                    None => return Err(self.error("dangling escape at end of id".to_string())),
                },
                Some((_, c)) => key.push(c),
            }
        }
        Ok(Edge::ToManyByKey {
            property,
            key_property,
            key,
        })
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().is_some_and(|&(_, c)| c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn error(&self, reason: String) -> ReferenceError {
        ReferenceError::InvalidReferenceId {
            id: self.text.to_string(),
            reason,
        }
    }
}
