//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use refgraph_core::{Config, ModelDocument, ModelGraph, NodeId};
use refgraph_reference::{ReferenceIdProvider, ReferenceIdResolver};
use refgraph_serialization::{
    DirectoryFileReader, DirectoryFileWriter, DistributedBinaryGraphDeserializer,
    DistributedBinaryGraphSerializer, SerializerOptions,
};

fn load_graph(model: &Path) -> anyhow::Result<ModelGraph> {
    let loaded = ModelDocument::load(model)
        .and_then(ModelDocument::into_graph)
        .with_context(|| format!("loading {}", model.display()))?;
    tracing::info!(
        "Loaded {} nodes, {} edges from {}",
        loaded.graph.node_count(),
        loaded.graph.edge_count(),
        model.display()
    );
    Ok(loaded.graph)
}

/// Reference ids for one element, or for every packageable element, as
/// sorted `(id, classifier)` rows.
pub fn collect_ids(graph: &ModelGraph, config: &Config, element: Option<&str>) -> anyhow::Result<Vec<(String, String)>> {
    let provider = ReferenceIdProvider::new(graph, &config.reference)?;
    let owners: Vec<NodeId> = match element {
        Some(path) => vec![graph
            .element_by_path(path)
            .with_context(|| format!("no element at path '{path}'"))?],
        None => graph.packageable_elements(),
    };
    provider.precompute(&owners)?;

    let mut rows = Vec::new();
    for owner in owners {
        for (node, id) in provider.ids_for_owner(owner)?.iter() {
            let classifier = graph.classifier(*node).unwrap_or_default();
            rows.push((id.clone(), classifier.to_string()));
        }
    }
    rows.sort();
    rows.dedup();
    Ok(rows)
}

pub fn ids(config: &Config, model: &Path, element: Option<&str>) -> anyhow::Result<()> {
    let graph = load_graph(model)?;
    let rows = collect_ids(&graph, config, element)?;
    for (id, classifier) in &rows {
        println!("{id}\t{classifier}");
    }
    tracing::info!("{} reference ids", rows.len());
    Ok(())
}

pub fn resolve(model: &Path, ids: &[String]) -> anyhow::Result<()> {
    let graph = load_graph(model)?;
    let resolver = ReferenceIdResolver::new(&graph);
    for id in ids {
        let node = resolver.resolve_reference(id)?;
        let classifier = graph.classifier(node).unwrap_or_default();
        match graph.name(node).or_else(|| graph.value_string(node, refgraph_core::m3::NAME)) {
            Some(name) => println!("{id}\t{classifier}\t{name}"),
            None => println!("{id}\t{classifier}"),
        }
    }
    Ok(())
}

pub fn serialize(
    config: &Config,
    model: &Path,
    out: &Path,
    name: Option<String>,
    repository: Option<&str>,
) -> anyhow::Result<()> {
    let graph = load_graph(model)?;
    let mut options = SerializerOptions::from(&config.serialization);
    if name.is_some() {
        options.metadata_name = name;
    }
    let serializer = DistributedBinaryGraphSerializer::new(&graph, options)?;
    let mut writer = DirectoryFileWriter::new(out);
    let summary = match repository {
        Some(repository) => serializer.serialize_repository(repository, &mut writer)?,
        None => serializer.serialize(&mut writer)?,
    };
    tracing::info!(
        "Wrote {} objects of {} classifiers in {} partitions to {}",
        summary.objects,
        summary.classifiers,
        summary.partitions,
        out.display()
    );
    if summary.dropped_duplicates > 0 {
        tracing::info!("Dropped {} duplicate import groups", summary.dropped_duplicates);
    }
    Ok(())
}

pub fn inspect(dir: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let reader = Arc::new(DirectoryFileReader::new(dir));
    let mut builder = DistributedBinaryGraphDeserializer::builder(reader);
    if let Some(name) = name {
        builder = builder.with_metadata_name(name);
    }
    let deserializer = builder
        .build()
        .with_context(|| format!("reading metadata under {}", dir.display()))?;
    for classifier in deserializer.classifiers() {
        let count = deserializer.classifier_instance_ids(&classifier)?.len();
        println!("{classifier}\t{count}");
    }
    Ok(())
}
