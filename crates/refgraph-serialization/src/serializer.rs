//! Distributed binary serialization of a model graph
//!
//! Objects are grouped by classifier, sorted by identifier, and appended to
//! size-capped partition files. Each classifier gets an index file locating
//! its objects by (partition, offset, length).

use std::collections::BTreeMap;

use refgraph_core::{m3, ModelGraph, NodeId, SerializationConfig};

use crate::codec::{encode_index, encode_obj, IndexEntry};
use crate::error::{Result, SerializationError};
use crate::files::FileWriter;
use crate::metadata::{self, MetadataSpecification};
use crate::obj::{Identifiers, Obj, ObjBuilder};
use crate::string_cache::{CacheKind, StringCacheBuilder};

#[derive(Debug, Clone)]
pub struct SerializerOptions {
    pub metadata_name: Option<String>,
    pub dependencies: Vec<String>,
    pub max_partition_bytes: usize,
    pub max_partitions: u32,
    pub string_partition_size: usize,
    pub cache_kind: CacheKind,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self::from(&SerializationConfig::default())
    }
}

impl From<&SerializationConfig> for SerializerOptions {
    fn from(config: &SerializationConfig) -> Self {
        SerializerOptions {
            metadata_name: config.metadata_name.clone(),
            dependencies: config.dependencies.clone(),
            max_partition_bytes: config.max_partition_bytes,
            max_partitions: i32::MAX as u32,
            string_partition_size: config.string_partition_size,
            cache_kind: CacheKind::Distributed,
        }
    }
}

impl SerializerOptions {
    pub fn with_metadata_name(mut self, name: impl Into<String>) -> Self {
        self.metadata_name = Some(name.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_partition_bytes(mut self, bytes: usize) -> Self {
        self.max_partition_bytes = bytes;
        self
    }

    pub fn with_max_partitions(mut self, partitions: u32) -> Self {
        self.max_partitions = partitions;
        self
    }

    pub fn with_string_partition_size(mut self, size: usize) -> Self {
        self.string_partition_size = size;
        self
    }

    pub fn with_cache_kind(mut self, kind: CacheKind) -> Self {
        self.cache_kind = kind;
        self
    }
}

/// What a serialization pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializationSummary {
    pub objects: usize,
    pub classifiers: usize,
    pub partitions: u32,
    pub classifier_strings: usize,
    pub other_strings: usize,
    pub dropped_duplicates: usize,
}

pub struct DistributedBinaryGraphSerializer<'g> {
    graph: &'g ModelGraph,
    options: SerializerOptions,
}

impl<'g> DistributedBinaryGraphSerializer<'g> {
    pub fn new(graph: &'g ModelGraph, options: SerializerOptions) -> Result<Self> {
        if let Some(name) = &options.metadata_name {
            MetadataSpecification::new(name.as_str(), options.dependencies.iter().cloned())?;
        }
        Ok(DistributedBinaryGraphSerializer { graph, options })
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    /// Serialize every node reachable from the graph's top-level nodes.
    pub fn serialize(&self, writer: &mut dyn FileWriter) -> Result<SerializationSummary> {
        let nodes = self.graph.reachable_from(self.graph.top_levels().collect::<Vec<_>>());
        let objs = self.collect_objs(&nodes, &nodes)?;
        self.write(objs, self.options.metadata_name.as_deref(), writer)
    }

    /// Serialize only nodes declared in sources under `/<repository>/`. The
    /// repository name doubles as the metadata name unless one is configured.
    pub fn serialize_repository(&self, repository: &str, writer: &mut dyn FileWriter) -> Result<SerializationSummary> {
        metadata::validate_metadata_name(repository)?;
        let prefix = format!("/{repository}/");
        let reachable = self.graph.reachable_from(self.graph.top_levels().collect::<Vec<_>>());
        let selected: Vec<NodeId> = reachable
            .iter()
            .copied()
            .filter(|n| self.graph.span(*n).is_some_and(|s| s.source_id.starts_with(&prefix)))
            .collect();
        tracing::debug!("Repository {} holds {} of {} nodes", repository, selected.len(), reachable.len());
        let objs = self.collect_objs(&selected, &reachable)?;
        let name = self.options.metadata_name.as_deref().unwrap_or(repository);
        self.write(objs, Some(name), writer)
    }

    /// `Obj` forms of `nodes`; identifiers are assigned over `universe` so
    /// references leaving the selection still resolve.
    pub fn collect_objs(&self, nodes: &[NodeId], universe: &[NodeId]) -> Result<Vec<Obj>> {
        let identifiers = Identifiers::build(self.graph, universe);
        let builder = ObjBuilder::new(self.graph, &identifiers);
        nodes.iter().map(|n| builder.build(*n)).collect()
    }

    /// Write `objs` under `metadata_name`.
    pub fn write(
        &self,
        objs: Vec<Obj>,
        metadata_name: Option<&str>,
        writer: &mut dyn FileWriter,
    ) -> Result<SerializationSummary> {
        let mut summary = SerializationSummary::default();
        let by_classifier = group_by_classifier(objs, &mut summary)?;

        let strings = StringCacheBuilder::new(self.options.cache_kind)
            .with_partition_size(self.options.string_partition_size)
            .with_objs(by_classifier.values().flatten())
            .build();

        if let Some(name) = metadata_name {
            MetadataSpecification::new(name, self.options.dependencies.iter().cloned())?.write(writer)?;
        }
        strings.write(writer, metadata_name)?;

        let mut partitions = PartitionWriter {
            writer,
            metadata_name,
            max_bytes: self.options.max_partition_bytes,
            max_partitions: self.options.max_partitions,
            current: 0,
            buffer: Vec::new(),
            written: 0,
        };
        for (classifier, objs) in &by_classifier {
            let mut entries = Vec::with_capacity(objs.len());
            for obj in objs {
                let bytes = encode_obj(obj, &strings)?;
                let (partition, offset) = partitions.append(&bytes)?;
                entries.push(IndexEntry {
                    partition,
                    offset,
                    length: bytes.len() as u32,
                    identifier: strings.other_id(&obj.identifier)?,
                });
            }
            partitions.writer.write_file(
                &metadata::classifier_index_path(metadata_name, classifier),
                &encode_index(&entries)?,
            )?;
            summary.objects += objs.len();
        }
        partitions.finish()?;

        summary.classifiers = by_classifier.len();
        summary.partitions = partitions.written;
        summary.classifier_strings = strings.classifier_strings().len();
        summary.other_strings = strings.other_strings().len();
        tracing::debug!(
            "Serialized {} objects of {} classifiers into {} partitions",
            summary.objects,
            summary.classifiers,
            summary.partitions
        );
        Ok(summary)
    }
}

/// Objects per classifier, sorted by identifier with duplicates removed.
fn group_by_classifier(objs: Vec<Obj>, summary: &mut SerializationSummary) -> Result<BTreeMap<String, Vec<Obj>>> {
    let mut by_classifier: BTreeMap<String, Vec<Obj>> = BTreeMap::new();
    for obj in objs {
        by_classifier.entry(obj.classifier.clone()).or_default().push(obj);
    }
    for (classifier, objs) in by_classifier.iter_mut() {
        objs.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        let before = objs.len();
        let mut clash = None;
        objs.dedup_by(|next, kept| {
            if next.identifier != kept.identifier || next == kept {
                return next.identifier == kept.identifier;
            }
            if classifier == m3::IMPORT_GROUP {
                tracing::warn!("Dropping duplicate {} '{}'", classifier, next.identifier);
                return true;
            }
            clash.get_or_insert_with(|| next.identifier.clone());
            false
        });
        if let Some(identifier) = clash {
            return Err(SerializationError::IdentifierClash {
                classifier: classifier.clone(),
                identifier,
            });
        }
        summary.dropped_duplicates += before - objs.len();
    }
    Ok(by_classifier)
}

struct PartitionWriter<'w> {
    writer: &'w mut dyn FileWriter,
    metadata_name: Option<&'w str>,
    max_bytes: usize,
    max_partitions: u32,
    current: u32,
    buffer: Vec<u8>,
    written: u32,
}

impl PartitionWriter<'_> {
    /// Append an encoded object, flushing first if it would overflow the
    /// current partition. Returns its (partition, offset).
    fn append(&mut self, bytes: &[u8]) -> Result<(u32, u32)> {
        if !self.buffer.is_empty() && self.buffer.len() + bytes.len() > self.max_bytes {
            self.flush()?;
            self.current += 1;
            if self.current >= self.max_partitions {
                return Err(SerializationError::TooManyPartitions(self.max_partitions));
            }
        }
        let offset = self.buffer.len() as u32;
        self.buffer.extend_from_slice(bytes);
        Ok((self.current, offset))
    }

    fn flush(&mut self) -> Result<()> {
        let path = metadata::partition_file_path(self.metadata_name, self.current);
        self.writer.write_file(&path, &self.buffer)?;
        tracing::debug!("Flushed partition {} ({} bytes)", self.current, self.buffer.len());
        self.buffer.clear();
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.flush()
    }
}
