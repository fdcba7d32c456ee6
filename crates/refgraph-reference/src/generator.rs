//! Reference id generation for one packageable element
//!
//! A FIFO search from the element over its internal, non-skipped properties.
//! Each node keeps the least `GraphPath` found for it; a search node that
//! does not improve on the recorded path is not expanded.

use std::collections::{BTreeMap, HashMap, VecDeque};

use refgraph_core::{ModelGraph, NodeId, SourceSpan, Value};

use crate::class_info::{ClassInfoCache, PropertyInfo};
use crate::containing::describe;
use crate::error::{ReferenceError, Result};
use crate::graph_path::{is_id_identifier, is_id_start_path, Edge, GraphPath};

pub struct ReferenceIdGenerator<'a> {
    graph: &'a ModelGraph,
    classes: &'a ClassInfoCache,
}

struct SearchNode {
    path: GraphPath,
    path_nodes: Vec<NodeId>,
    classifier: String,
}

impl SearchNode {
    fn last(&self) -> NodeId {
        self.path_nodes[self.path_nodes.len() - 1]
    }
}

impl<'a> ReferenceIdGenerator<'a> {
    pub fn new(graph: &'a ModelGraph, classes: &'a ClassInfoCache) -> Self {
        ReferenceIdGenerator { graph, classes }
    }

    /// Reference id of every addressable node owned by `element`.
    pub fn generate_ids(&self, element: NodeId) -> Result<HashMap<NodeId, String>> {
        Ok(self
            .generate_paths(element)?
            .into_iter()
            .map(|(node, path)| (node, path.description()))
            .collect())
    }

    /// Least graph path of every addressable node owned by `element`.
    pub fn generate_paths(&self, element: NodeId) -> Result<HashMap<NodeId, GraphPath>> {
        let path = self.validate(element)?;
        let Some(element_span) = self.graph.span(element) else {
            if self.graph.is_package(element) {
                return Ok(HashMap::from([(element, GraphPath::new(path))]));
            }
            return Err(ReferenceError::InvalidElement(format!(
                "No source information for '{path}'"
            )));
        };

        let search = Search {
            graph: self.graph,
            classes: self.classes,
            element,
            element_span,
        };
        let classifier = self
            .graph
            .classifier(element)
            .ok_or(ReferenceError::UnknownNode(element))?
            .to_string();
        let paths = search.run(SearchNode {
            path: GraphPath::new(path.clone()),
            path_nodes: vec![element],
            classifier,
        })?;
        tracing::debug!("Generated {} reference ids for {}", paths.len(), path);
        Ok(paths)
    }

    /// Check name and path consistency; returns the element path.
    fn validate(&self, element: NodeId) -> Result<String> {
        if !self.graph.contains(element) {
            return Err(ReferenceError::UnknownNode(element));
        }
        if !self.graph.is_packageable_element(element) {
            return Err(ReferenceError::InvalidElement(format!(
                "Invalid element: {} is not a packageable element",
                describe(self.graph, element)
            )));
        }
        let path = self.graph.element_path(element).unwrap_or_default();
        if path.is_empty() {
            return Err(ReferenceError::InvalidElement(format!(
                "Invalid element: empty path for {}",
                describe(self.graph, element)
            )));
        }
        let (Some(name), Some(instance_name)) = (
            self.graph.value_string(element, refgraph_core::m3::NAME),
            self.graph.name(element),
        ) else {
            return Err(ReferenceError::InvalidElement(format!(
                "Invalid element '{path}': name is null"
            )));
        };
        if instance_name != name {
            return Err(ReferenceError::InvalidElement(format!(
                "Invalid element '{path}': instance name ('{instance_name}') does not match name property ('{name}')"
            )));
        }
        let valid_path = path == name
            || (path.len() > name.len()
                && path.ends_with(name)
                && path[..path.len() - name.len()].ends_with(':'));
        if !valid_path {
            return Err(ReferenceError::InvalidElement(format!(
                "Invalid path for element named '{name}': '{path}'"
            )));
        }
        if !is_id_start_path(&path) {
            return Err(ReferenceError::InvalidElement(format!(
                "Invalid element '{path}': path cannot start a reference id"
            )));
        }
        Ok(path)
    }
}

struct Search<'a> {
    graph: &'a ModelGraph,
    classes: &'a ClassInfoCache,
    element: NodeId,
    element_span: &'a SourceSpan,
}

impl Search<'_> {
    fn run(&self, seed: SearchNode) -> Result<HashMap<NodeId, GraphPath>> {
        let mut queue = VecDeque::from([seed]);
        let mut paths: HashMap<NodeId, GraphPath> = HashMap::new();
        while let Some(search_node) = queue.pop_front() {
            let node = search_node.last();
            if self.graph.span(node).is_none() || self.classes.is_stub(&search_node.classifier) {
                // Proxies are walked through but never addressed
                self.advance(&search_node, &mut queue)?;
                continue;
            }
            if paths.get(&node).is_some_and(|old| search_node.path >= *old) {
                continue;
            }
            paths.insert(node, search_node.path.clone());
            self.advance(&search_node, &mut queue)?;
        }
        Ok(paths)
    }

    fn advance(&self, search_node: &SearchNode, queue: &mut VecDeque<SearchNode>) -> Result<()> {
        let node = search_node.last();
        let info = self.classes.class_info(self.graph, &search_node.classifier)?;
        for (property, property_info) in info.properties() {
            if property_info.skip {
                continue;
            }
            let links_nodes = self.graph.values(node, property).iter().any(|v| v.as_node().is_some());
            if links_nodes && !is_id_identifier(property) {
                return Err(ReferenceError::InvalidElement(format!(
                    "Invalid property name '{property}' on {}: not usable in a reference id",
                    search_node.classifier
                )));
            }

            if property_info.to_one {
                if let Some(Value::Node(value)) = self.graph.value(node, property) {
                    self.enqueue_if_addressable(search_node, *value, Edge::to_one(property), queue);
                }
                continue;
            }

            let values = self.graph.values(node, property);
            if values.is_empty() {
                continue;
            }
            match self.try_index(property_info, values)? {
                Some((key_property, index)) => {
                    for (key, value) in index {
                        let edge = Edge::with_key(property, key_property.as_str(), key);
                        self.enqueue_if_addressable(search_node, value, edge, queue);
                    }
                }
                None => {
                    for (i, value) in values.iter().enumerate() {
                        if let Value::Node(value) = value {
                            self.enqueue_if_addressable(search_node, *value, Edge::at_index(property, i), queue);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn enqueue_if_addressable(
        &self,
        search_node: &SearchNode,
        value: NodeId,
        edge: Edge,
        queue: &mut VecDeque<SearchNode>,
    ) {
        if !self.is_internal(value) || search_node.path_nodes.contains(&value) {
            return;
        }
        let Some(classifier) = self.graph.classifier(value) else {
            return;
        };
        if self.classes.is_primitive(classifier) {
            return;
        }
        let mut path_nodes = Vec::with_capacity(search_node.path_nodes.len() + 1);
        path_nodes.extend_from_slice(&search_node.path_nodes);
        path_nodes.push(value);
        queue.push_back(SearchNode {
            path: search_node.path.with_edge(edge),
            path_nodes,
            classifier: classifier.to_string(),
        });
    }

    /// Spanned nodes are internal if the element's span covers them; spanless
    /// nodes are internal unless they are packages.
    fn is_internal(&self, node: NodeId) -> bool {
        if node == self.element {
            return true;
        }
        match self.graph.span(node) {
            Some(span) => self.element_span.subsumes(span),
            None => !self.graph.is_package(node),
        }
    }

    /// Key the values by the first index key of the property's raw type under
    /// which every value has a distinct string key.
    fn try_index(
        &self,
        property_info: &PropertyInfo,
        values: &[Value],
    ) -> Result<Option<(String, BTreeMap<String, NodeId>)>> {
        let Some(raw_type) = property_info.raw_type.as_deref() else {
            return Ok(None);
        };
        for key_property in self.classes.index_keys(self.graph, raw_type)? {
            if !is_id_identifier(&key_property) {
                continue;
            }
            if let Some(index) = self.index_by(&key_property, values) {
                return Ok(Some((key_property, index)));
            }
        }
        Ok(None)
    }

    fn index_by(&self, key_property: &str, values: &[Value]) -> Option<BTreeMap<String, NodeId>> {
        let mut index = BTreeMap::new();
        for value in values {
            let node = value.as_node()?;
            let key = self.graph.value_string(node, key_property)?;
            if index.insert(key.to_string(), node).is_some() {
                return None;
            }
        }
        Some(index)
    }
}
