//! Maps any node to the packageable element that contains it
//!
//! Elements with source information are bucketed per source id and sorted by
//! start position; lookups binary search the bucket for the node's source.
//! Elements without source information must be packages and are tracked as
//! virtual elements.

use std::collections::{HashMap, HashSet};

use refgraph_core::{ModelGraph, NodeId, SourceSpan};

use crate::error::{ReferenceError, Result};

#[derive(Debug, Clone)]
struct IndexedElement {
    id: NodeId,
    span: SourceSpan,
}

/// Immutable containing-element index.
#[derive(Debug, Default)]
pub struct ContainingElementIndex {
    by_source: HashMap<String, Vec<IndexedElement>>,
    virtual_elements: HashSet<NodeId>,
}

impl ContainingElementIndex {
    pub fn builder(graph: &ModelGraph) -> ContainingElementIndexBuilder<'_> {
        ContainingElementIndexBuilder {
            graph,
            by_source: HashMap::new(),
            virtual_elements: HashSet::new(),
        }
    }

    /// Index every packageable element reachable from `Root`.
    pub fn for_graph(graph: &ModelGraph) -> Result<Self> {
        let mut builder = Self::builder(graph);
        builder.add_elements(graph.packageable_elements())?;
        builder.build()
    }

    /// Number of indexed elements, virtual ones included.
    pub fn element_count(&self) -> usize {
        self.by_source.values().map(Vec::len).sum::<usize>() + self.virtual_elements.len()
    }

    pub fn source_count(&self) -> usize {
        self.by_source.len()
    }

    /// The element whose span contains the node, or the node itself if it is
    /// indexed. Nodes without source information only match virtual elements.
    pub fn find_containing_element(&self, graph: &ModelGraph, node: NodeId) -> Option<NodeId> {
        let Some(span) = graph.span(node) else {
            return self.virtual_elements.contains(&node).then_some(node);
        };
        let elements = self.by_source.get(&span.source_id)?;

        let mut low = 0usize;
        let mut high = elements.len();
        while low < high {
            let mid = low + (high - low) / 2;
            let element = &elements[mid];
            if element.id == node {
                return Some(element.id);
            }
            if element.span.is_before(span) {
                low = mid + 1;
            } else if element.span.is_after(span) {
                high = mid;
            } else {
                return Some(element.id);
            }
        }
        None
    }
}

pub struct ContainingElementIndexBuilder<'g> {
    graph: &'g ModelGraph,
    by_source: HashMap<String, Vec<IndexedElement>>,
    virtual_elements: HashSet<NodeId>,
}

impl<'g> ContainingElementIndexBuilder<'g> {
    pub fn add_element(&mut self, id: NodeId) -> Result<&mut Self> {
        let node = self.graph.node(id).ok_or(ReferenceError::UnknownNode(id))?;
        match &node.span {
            None if self.graph.is_package(id) => {
                self.virtual_elements.insert(id);
            }
            None => {
                return Err(ReferenceError::InvalidElement(format!(
                    "Invalid element, no source information: {}",
                    describe(self.graph, id)
                )));
            }
            Some(span) if !span.is_valid() => {
                return Err(ReferenceError::InvalidElement(format!(
                    "Invalid source information for element {}: {}",
                    describe(self.graph, id),
                    span
                )));
            }
            Some(span) => {
                self.by_source
                    .entry(span.source_id.clone())
                    .or_default()
                    .push(IndexedElement {
                        id,
                        span: span.clone(),
                    });
            }
        }
        Ok(self)
    }

    pub fn add_elements(&mut self, ids: impl IntoIterator<Item = NodeId>) -> Result<&mut Self> {
        for id in ids {
            self.add_element(id)?;
        }
        Ok(self)
    }

    /// Sort each bucket, drop repeated entries for the same element, and
    /// reject overlapping spans of distinct elements.
    pub fn build(self) -> Result<ContainingElementIndex> {
        let mut by_source = self.by_source;
        for elements in by_source.values_mut() {
            elements.sort_by(|a, b| a.span.compare_by_start(&b.span));
            elements.dedup_by(|next, prev| next.id == prev.id);
            for pair in elements.windows(2) {
                if pair[0].span.overlaps(&pair[1].span) {
                    return Err(ReferenceError::OverlappingElements {
                        first: describe(self.graph, pair[0].id),
                        first_span: pair[0].span.to_string(),
                        second: describe(self.graph, pair[1].id),
                        second_span: pair[1].span.to_string(),
                    });
                }
            }
        }
        let index = ContainingElementIndex {
            by_source,
            virtual_elements: self.virtual_elements,
        };
        tracing::debug!(
            "Built containing element index: {} elements across {} sources",
            index.element_count(),
            index.source_count()
        );
        Ok(index)
    }
}

/// Element path if known, otherwise classifier and node id.
pub(crate) fn describe(graph: &ModelGraph, id: NodeId) -> String {
    if graph.is_packageable_element(id) {
        if let Some(path) = graph.element_path(id) {
            return path;
        }
    }
    match graph.node(id) {
        Some(node) => match &node.span {
            Some(span) => format!("instance of {} at {}", node.classifier, span),
            None => format!("instance of {} ({})", node.classifier, id),
        },
        None => id.to_string(),
    }
}
