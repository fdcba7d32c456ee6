//! Model graph wrapper using petgraph::StableDiGraph with NodeId handles

use std::collections::BTreeMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;

use crate::error::{CoreError, Result};
use crate::m3;
use crate::model::*;
use crate::types::{ClassDescriptor, TypeRegistry};

/// The model graph. Node-valued properties are mirrored as labeled edges so
/// that traversals can use petgraph directly.
pub struct ModelGraph {
    inner: StableDiGraph<ModelNode, PropertyEdge>,
    types: TypeRegistry,
    root: NodeId,
    top_levels: BTreeMap<String, NodeId>,
}

impl std::fmt::Debug for ModelGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("classifier_count", &self.types.len())
            .finish()
    }
}

fn index(id: NodeId) -> NodeIndex {
    NodeIndex::new(id.0 as usize)
}

fn node_id(idx: NodeIndex) -> NodeId {
    NodeId(idx.index() as u64)
}

impl ModelGraph {
    /// Create a graph holding only the `Root` package.
    pub fn new(types: TypeRegistry) -> Self {
        let mut inner = StableDiGraph::new();
        let root = ModelNode::new(m3::PACKAGE)
            .with_name(m3::ROOT)
            .with_primitive(m3::NAME, Primitive::String(m3::ROOT.to_string()));
        let root = node_id(inner.add_node(root));
        let mut top_levels = BTreeMap::new();
        top_levels.insert(m3::ROOT.to_string(), root);
        ModelGraph {
            inner,
            types,
            root,
            top_levels,
        }
    }

    pub fn with_m3() -> Self {
        Self::new(TypeRegistry::with_m3())
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // ── Construction ────────────────────────────────────────

    /// Add a node. Node-valued properties whose targets are not in the graph
    /// are dropped.
    pub fn add_node(&mut self, mut node: ModelNode) -> NodeId {
        for (property, values) in node.properties.iter_mut() {
            values.retain(|v| match v {
                Value::Node(target) if !self.contains(*target) => {
                    tracing::warn!("Dropping dangling reference {} from property {}", target, property);
                    false
                }
                _ => true,
            });
        }
        let edges: Vec<(NodeId, PropertyEdge)> = node
            .properties
            .iter()
            .flat_map(|(property, values)| {
                values.iter().enumerate().filter_map(move |(position, v)| {
                    v.as_node().map(|target| {
                        (
                            target,
                            PropertyEdge {
                                property: property.clone(),
                                position: position as u32,
                            },
                        )
                    })
                })
            })
            .collect();
        let id = node_id(self.inner.add_node(node));
        for (target, edge) in edges {
            self.inner.add_edge(index(id), index(target), edge);
        }
        id
    }

    /// Register a node that is addressable by name without a package.
    pub fn add_top_level(&mut self, node: ModelNode) -> NodeId {
        let name = node.name.clone();
        let id = self.add_node(node);
        if let Some(name) = name {
            self.top_levels.insert(name, id);
        }
        id
    }

    /// Append a value to a property.
    pub fn push_value(&mut self, id: NodeId, property: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Value::Node(target) = value {
            if !self.contains(target) {
                return Err(CoreError::UnknownNode(target));
            }
        }
        let node = self
            .inner
            .node_weight_mut(index(id))
            .ok_or(CoreError::UnknownNode(id))?;
        let values = node.properties.entry(property.to_string()).or_default();
        let position = values.len() as u32;
        values.push(value.clone());
        if let Value::Node(target) = value {
            self.inner.add_edge(
                index(id),
                index(target),
                PropertyEdge {
                    property: property.to_string(),
                    position,
                },
            );
        }
        Ok(())
    }

    /// Replace all values of a property with a single value.
    pub fn set_value(&mut self, id: NodeId, property: &str, value: impl Into<Value>) -> Result<()> {
        self.clear_property(id, property)?;
        self.push_value(id, property, value)
    }

    /// Remove all values of a property.
    pub fn clear_property(&mut self, id: NodeId, property: &str) -> Result<()> {
        let node = self
            .inner
            .node_weight_mut(index(id))
            .ok_or(CoreError::UnknownNode(id))?;
        node.properties.remove(property);
        let stale: Vec<_> = self
            .inner
            .edges_directed(index(id), Direction::Outgoing)
            .filter(|e| e.weight().property == property)
            .map(|e| e.id())
            .collect();
        for edge in stale {
            self.inner.remove_edge(edge);
        }
        Ok(())
    }

    pub fn set_span(&mut self, id: NodeId, span: Option<SourceSpan>) -> Result<()> {
        let node = self
            .inner
            .node_weight_mut(index(id))
            .ok_or(CoreError::UnknownNode(id))?;
        node.span = span;
        Ok(())
    }

    /// Get or create the package at `path`, creating missing ancestors.
    pub fn ensure_package(&mut self, path: &str) -> Result<NodeId> {
        if path.is_empty() || path == m3::ROOT || path == m3::PATH_SEPARATOR {
            return Ok(self.root);
        }
        let mut current = self.root;
        for segment in path.split(m3::PATH_SEPARATOR) {
            if segment.is_empty() {
                return Err(CoreError::InvalidPackagePath(path.to_string()));
            }
            current = match self.child_named(current, segment) {
                Some(child) if self.is_package(child) => child,
                Some(child) => {
                    return Err(CoreError::NotAPackage {
                        path: path.to_string(),
                        classifier: self.classifier(child).unwrap_or_default().to_string(),
                    });
                }
                None => {
                    let package = ModelNode::new(m3::PACKAGE).with_name(segment);
                    self.attach(current, package)?
                }
            };
        }
        Ok(current)
    }

    /// Add a packageable element under `package_path`, wiring `name`,
    /// `package` and the parent's `children`.
    pub fn add_element(&mut self, package_path: &str, node: ModelNode) -> Result<NodeId> {
        let package = self.ensure_package(package_path)?;
        self.attach(package, node)
    }

    fn attach(&mut self, package: NodeId, mut node: ModelNode) -> Result<NodeId> {
        if let Some(name) = &node.name {
            if !node.properties.contains_key(m3::NAME) {
                node.properties
                    .insert(m3::NAME.to_string(), vec![Value::string(name.clone())]);
            }
        }
        let id = self.add_node(node);
        self.set_value(id, m3::PACKAGE_PROPERTY, package)?;
        self.push_value(package, m3::CHILDREN, id)?;
        Ok(id)
    }

    // ── Node access ─────────────────────────────────────────

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.contains_node(index(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&ModelNode> {
        self.inner.node_weight(index(id))
    }

    pub fn classifier(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.classifier.as_str())
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.name.as_deref())
    }

    pub fn span(&self, id: NodeId) -> Option<&SourceSpan> {
        self.node(id).and_then(|n| n.span.as_ref())
    }

    /// All values of a property, empty if unset.
    pub fn values(&self, id: NodeId, property: &str) -> &[Value] {
        self.node(id).map(|n| n.values(property)).unwrap_or(&[])
    }

    /// First value of a property.
    pub fn value(&self, id: NodeId, property: &str) -> Option<&Value> {
        self.values(id, property).first()
    }

    pub fn value_node(&self, id: NodeId, property: &str) -> Option<NodeId> {
        self.value(id, property).and_then(Value::as_node)
    }

    pub fn value_string(&self, id: NodeId, property: &str) -> Option<&str> {
        self.value(id, property).and_then(Value::as_str)
    }

    pub fn package_of(&self, id: NodeId) -> Option<NodeId> {
        self.value_node(id, m3::PACKAGE_PROPERTY)
    }

    pub fn is_package(&self, id: NodeId) -> bool {
        self.classifier(id) == Some(m3::PACKAGE)
    }

    pub fn is_packageable_element(&self, id: NodeId) -> bool {
        match self.classifier(id) {
            Some(classifier) => {
                self.types.is_subtype(classifier, m3::PACKAGEABLE_ELEMENT)
                    || self.package_of(id).is_some()
            }
            None => false,
        }
    }

    /// True if the node is a value of an enumeration declared in this graph.
    pub fn is_enum_value(&self, id: NodeId) -> bool {
        self.classifier(id)
            .and_then(|c| self.element_by_path(c))
            .and_then(|e| self.classifier(e))
            == Some(m3::ENUMERATION)
    }

    /// Descriptor for a classifier. Enumerations declared in the graph act as
    /// classifiers of their values and resolve to `Enum`.
    pub fn class_descriptor(&self, classifier: &str) -> Option<&ClassDescriptor> {
        self.types.class(classifier).or_else(|| {
            let element = self.element_by_path(classifier)?;
            (self.classifier(element) == Some(m3::ENUMERATION))
                .then(|| self.types.class(m3::ENUM))
                .flatten()
        })
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.node_indices().map(node_id)
    }

    pub fn top_levels(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.top_levels.values().copied()
    }

    // ── Paths ───────────────────────────────────────────────

    /// User path of a packageable element, e.g. `my::pkg::Foo`. Elements
    /// directly under `Root` have no prefix.
    pub fn element_path(&self, id: NodeId) -> Option<String> {
        if id == self.root {
            return Some(m3::ROOT.to_string());
        }
        let mut segments = vec![self.element_name(id)?];
        let mut current = self.package_of(id);
        let mut guard = 0usize;
        while let Some(package) = current {
            if package == self.root {
                break;
            }
            segments.push(self.element_name(package)?);
            current = self.package_of(package);
            guard += 1;
            if guard > self.node_count() {
                return None;
            }
        }
        segments.reverse();
        Some(segments.join(m3::PATH_SEPARATOR))
    }

    fn element_name(&self, id: NodeId) -> Option<String> {
        self.name(id)
            .or_else(|| self.value_string(id, m3::NAME))
            .map(str::to_string)
    }

    /// Find a packageable element by its user path.
    pub fn element_by_path(&self, path: &str) -> Option<NodeId> {
        if path == m3::PATH_SEPARATOR {
            return Some(self.root);
        }
        if let Some(id) = self.top_levels.get(path) {
            return Some(*id);
        }
        let mut current = self.root;
        for segment in path.split(m3::PATH_SEPARATOR) {
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }

    fn child_named(&self, package: NodeId, name: &str) -> Option<NodeId> {
        self.values(package, m3::CHILDREN)
            .iter()
            .filter_map(Value::as_node)
            .find(|child| self.name(*child) == Some(name) || self.value_string(*child, m3::NAME) == Some(name))
    }

    /// Every packageable element reachable from `Root` through `children`,
    /// plus the top-level nodes. Breadth-first, packages included.
    pub fn packageable_elements(&self) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = self.top_levels.values().copied().collect();
        let mut queue: std::collections::VecDeque<NodeId> = result.iter().copied().collect();
        let mut seen: std::collections::HashSet<NodeId> = result.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            for child in self.values(current, m3::CHILDREN).iter().filter_map(Value::as_node) {
                if seen.insert(child) {
                    result.push(child);
                    queue.push_back(child);
                }
            }
        }
        result
    }

    // ── Traversal ───────────────────────────────────────────

    /// Nodes reachable from `roots` along property edges, in depth-first order.
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut visited = Vec::new();
        let mut dfs = Dfs::empty(&self.inner);
        for root in roots {
            if !self.contains(root) || dfs.discovered.contains(index(root).index()) {
                continue;
            }
            dfs.move_to(index(root));
            while let Some(nx) = dfs.next(&self.inner) {
                visited.push(node_id(nx));
            }
        }
        visited
    }

    /// Incoming references: (referencing node, edge label).
    pub fn references_to(&self, target: NodeId) -> Vec<(NodeId, &PropertyEdge)> {
        self.inner
            .edges_directed(index(target), Direction::Incoming)
            .map(|e| (node_id(e.source()), e.weight()))
            .collect()
    }
}

impl Default for ModelGraph {
    fn default() -> Self {
        Self::with_m3()
    }
}
