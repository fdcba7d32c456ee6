//! Reference id provider and resolver

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;
use refgraph_core::{ModelGraph, NodeId, ReferenceConfig};

use crate::class_info::ClassInfoCache;
use crate::containing::{describe, ContainingElementIndex};
use crate::error::{ReferenceError, Result};
use crate::generator::ReferenceIdGenerator;
use crate::graph_path::GraphPath;

type IdMap = Arc<HashMap<NodeId, String>>;

/// Answers reference id requests for one graph snapshot. Id maps are computed
/// per containing element on first use and cached for the provider's lifetime.
pub struct ReferenceIdProvider<'g> {
    graph: &'g ModelGraph,
    index: ContainingElementIndex,
    classes: ClassInfoCache,
    ids_by_owner: DashMap<NodeId, IdMap>,
}

impl<'g> ReferenceIdProvider<'g> {
    /// Index every packageable element of the graph.
    pub fn new(graph: &'g ModelGraph, config: &ReferenceConfig) -> Result<Self> {
        let index = ContainingElementIndex::for_graph(graph)?;
        Ok(Self::with_index(graph, index, ClassInfoCache::new(config)))
    }

    pub fn with_index(graph: &'g ModelGraph, index: ContainingElementIndex, classes: ClassInfoCache) -> Self {
        ReferenceIdProvider {
            graph,
            index,
            classes,
            ids_by_owner: DashMap::new(),
        }
    }

    pub fn graph(&self) -> &'g ModelGraph {
        self.graph
    }

    pub fn index(&self) -> &ContainingElementIndex {
        &self.index
    }

    pub fn has_reference_id(&self, node: NodeId) -> bool {
        let Some(owner) = self.index.find_containing_element(self.graph, node) else {
            return false;
        };
        self.ids_for_owner(owner)
            .map(|ids| ids.contains_key(&node))
            .unwrap_or(false)
    }

    pub fn reference_id(&self, node: NodeId) -> Result<String> {
        let Some(owner) = self.index.find_containing_element(self.graph, node) else {
            return Err(self.cannot_provide(node, None, "no containing element found", None));
        };
        let ids = self.ids_for_owner(owner).map_err(|e| {
            self.cannot_provide(node, Some(owner), "error computing reference ids", Some(e))
        })?;
        ids.get(&node).cloned().ok_or_else(|| {
            self.cannot_provide(node, Some(owner), "node is not addressable from its containing element", None)
        })
    }

    /// The id map for one containing element, computed on first use.
    /// Concurrent first requests for the same owner may compute it twice; the
    /// first insert wins.
    pub fn ids_for_owner(&self, owner: NodeId) -> Result<IdMap> {
        if let Some(ids) = self.ids_by_owner.get(&owner) {
            return Ok(Arc::clone(ids.value()));
        }
        let ids = Arc::new(ReferenceIdGenerator::new(self.graph, &self.classes).generate_ids(owner)?);
        let entry = self.ids_by_owner.entry(owner).or_insert(ids);
        Ok(Arc::clone(entry.value()))
    }

    /// Fill the cache for many owners in parallel.
    pub fn precompute(&self, owners: &[NodeId]) -> Result<()> {
        owners
            .par_iter()
            .try_for_each(|owner| self.ids_for_owner(*owner).map(|_| ()))?;
        tracing::debug!("Precomputed reference ids for {} elements", owners.len());
        Ok(())
    }

    pub fn cached_owner_count(&self) -> usize {
        self.ids_by_owner.len()
    }

    pub fn resolver(&self) -> ReferenceIdResolver<'g> {
        ReferenceIdResolver::new(self.graph)
    }

    fn cannot_provide(
        &self,
        node: NodeId,
        owner: Option<NodeId>,
        reason: &str,
        source: Option<ReferenceError>,
    ) -> ReferenceError {
        let owner = owner.map(|o| describe(self.graph, o));
        let reason = match &owner {
            Some(owner) => format!("{reason} (containing element: {owner})"),
            None => reason.to_string(),
        };
        ReferenceError::CannotProvide {
            reference: describe(self.graph, node),
            owner,
            reason,
            source: source.map(Box::new),
        }
    }
}

/// Resolves reference ids back to nodes.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceIdResolver<'g> {
    graph: &'g ModelGraph,
}

impl<'g> ReferenceIdResolver<'g> {
    pub fn new(graph: &'g ModelGraph) -> Self {
        ReferenceIdResolver { graph }
    }

    pub fn resolve_reference(&self, reference_id: &str) -> Result<NodeId> {
        let path = GraphPath::parse(reference_id)?;
        let node = path.resolve(self.graph)?;
        tracing::debug!("Resolved {} to {}", reference_id, node);
        Ok(node)
    }
}
