//! String interning for serialized objects
//!
//! Every string written to a partition is replaced by an `i32` id:
//!
//! ```text
//!  0          null
//! -1, -2, ..  classifier ids, by position in the sorted classifier array
//!  1,  2, ..  other strings, by position in the sorted other array
//! ```
//!
//! Written files:
//!
//! ```text
//! classifiers.idx      Vec<String>                       (bincode)
//! other.idx            count: u32, partition_size: u32   (bincode)
//! other-<start>.idx    Vec<String>, at most partition_size entries
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SerializationError};
use crate::files::FileWriter;
use crate::metadata;
use crate::obj::{Obj, RValue};

pub fn classifier_index_to_id(index: usize) -> i32 {
    -(index as i32) - 1
}

pub fn id_to_classifier_index(id: i32) -> usize {
    (-(id + 1)) as usize
}

pub fn other_index_to_id(index: usize) -> i32 {
    index as i32 + 1
}

pub fn id_to_other_index(id: i32) -> usize {
    (id - 1) as usize
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct OtherStringsHeader {
    pub count: u32,
    pub partition_size: u32,
}

/// How the other strings are gathered and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKind {
    /// One flat array, written as a single partition.
    Simple,
    /// Gathered per classifier, written in fixed-size partitions.
    #[default]
    Distributed,
}

// ── Builder ─────────────────────────────────────────────

#[derive(Debug)]
pub struct StringCacheBuilder {
    kind: CacheKind,
    partition_size: usize,
    classifiers: BTreeSet<String>,
    other: BTreeMap<String, BTreeSet<String>>,
}

impl StringCacheBuilder {
    pub fn new(kind: CacheKind) -> Self {
        StringCacheBuilder {
            kind,
            partition_size: refgraph_core::config::DEFAULT_STRING_PARTITION_SIZE,
            classifiers: BTreeSet::new(),
            other: BTreeMap::new(),
        }
    }

    pub fn with_partition_size(mut self, partition_size: usize) -> Self {
        self.partition_size = partition_size.max(1);
        self
    }

    pub fn with_obj(mut self, obj: &Obj) -> Self {
        self.add_obj(obj);
        self
    }

    pub fn with_objs<'o>(mut self, objs: impl IntoIterator<Item = &'o Obj>) -> Self {
        for obj in objs {
            self.add_obj(obj);
        }
        self
    }

    fn add_obj(&mut self, obj: &Obj) {
        self.classifiers.insert(obj.classifier.clone());
        // Simple caches keep a single group
        let group = match self.kind {
            CacheKind::Simple => String::new(),
            CacheKind::Distributed => obj.classifier.clone(),
        };
        let other = self.other.entry(group).or_default();
        other.insert(obj.identifier.clone());
        if let Some(name) = &obj.name {
            other.insert(name.clone());
        }
        if let Some(span) = &obj.source_info {
            other.insert(span.source_id.clone());
        }
        for property in &obj.properties {
            other.insert(property.name.clone());
            for value in &property.values {
                match value {
                    RValue::Primitive(p) => {
                        if let Some(text) = p.as_text() {
                            other.insert(text.to_string());
                        }
                    }
                    RValue::ObjRef { classifier, identifier } => {
                        self.classifiers.insert(classifier.clone());
                        other.insert(identifier.clone());
                    }
                    RValue::EnumRef { enumeration, name } => {
                        self.classifiers.insert(enumeration.clone());
                        other.insert(name.clone());
                    }
                }
            }
        }
    }

    pub fn build(self) -> StringCache {
        let classifiers: Vec<String> = self.classifiers.into_iter().collect();
        let other: Vec<String> = self
            .other
            .into_values()
            .flatten()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let partition_size = match self.kind {
            CacheKind::Simple => other.len().max(1),
            CacheKind::Distributed => self.partition_size,
        };
        StringCache::new(self.kind, partition_size, classifiers, other)
    }
}

// ── Cache ───────────────────────────────────────────────

pub struct StringCache {
    kind: CacheKind,
    partition_size: usize,
    classifiers: Vec<String>,
    other: Vec<String>,
    classifier_ids: HashMap<String, i32>,
    other_ids: HashMap<String, i32>,
}

impl std::fmt::Debug for StringCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringCache")
            .field("kind", &self.kind)
            .field("classifier_count", &self.classifiers.len())
            .field("other_count", &self.other.len())
            .field("partition_size", &self.partition_size)
            .finish()
    }
}

impl StringCache {
    fn new(kind: CacheKind, partition_size: usize, classifiers: Vec<String>, other: Vec<String>) -> Self {
        let classifier_ids = classifiers
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), classifier_index_to_id(i)))
            .collect();
        let other_ids = other
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), other_index_to_id(i)))
            .collect();
        StringCache {
            kind,
            partition_size,
            classifiers,
            other,
            classifier_ids,
            other_ids,
        }
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    pub fn classifier_strings(&self) -> &[String] {
        &self.classifiers
    }

    pub fn other_strings(&self) -> &[String] {
        &self.other
    }

    pub fn classifier_id(&self, classifier: &str) -> Result<i32> {
        self.classifier_ids
            .get(classifier)
            .copied()
            .ok_or_else(|| SerializationError::UnknownString(classifier.to_string()))
    }

    pub fn other_id(&self, s: &str) -> Result<i32> {
        self.other_ids
            .get(s)
            .copied()
            .ok_or_else(|| SerializationError::UnknownString(s.to_string()))
    }

    /// Any collected string, other strings first; `None` maps to 0.
    pub fn string_id(&self, s: Option<&str>) -> Result<i32> {
        let Some(s) = s else {
            return Ok(0);
        };
        self.other_ids
            .get(s)
            .or_else(|| self.classifier_ids.get(s))
            .copied()
            .ok_or_else(|| SerializationError::UnknownString(s.to_string()))
    }

    /// Inverse of the id mapping, over this cache only.
    pub fn string(&self, id: i32) -> Result<Option<&str>> {
        let found = match id {
            0 => return Ok(None),
            id if id < 0 => self.classifiers.get(id_to_classifier_index(id)),
            id => self.other.get(id_to_other_index(id)),
        };
        found
            .map(|s| Some(s.as_str()))
            .ok_or(SerializationError::UnknownStringId(id))
    }

    pub fn write(&self, writer: &mut dyn FileWriter, metadata_name: Option<&str>) -> Result<()> {
        writer.write_file(
            &metadata::classifier_strings_path(metadata_name),
            &bincode::serialize(&self.classifiers)?,
        )?;
        let header = OtherStringsHeader {
            count: self.other.len() as u32,
            partition_size: self.partition_size as u32,
        };
        writer.write_file(
            &metadata::other_strings_header_path(metadata_name),
            &bincode::serialize(&header)?,
        )?;
        for (i, chunk) in self.other.chunks(self.partition_size).enumerate() {
            let start = i * self.partition_size;
            writer.write_file(
                &metadata::other_strings_partition_path(metadata_name, start),
                &bincode::serialize(chunk)?,
            )?;
        }
        tracing::debug!(
            "Wrote {} classifier and {} other strings",
            self.classifiers.len(),
            self.other.len()
        );
        Ok(())
    }
}
