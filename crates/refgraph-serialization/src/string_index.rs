//! Read side of the string cache

use std::sync::Arc;

use once_cell::race::OnceBox;

use crate::error::{Result, SerializationError};
use crate::files::FileReader;
use crate::metadata;
use crate::string_cache::{id_to_classifier_index, id_to_other_index, OtherStringsHeader, StringCache};

/// Maps string ids back to strings.
pub trait StringIndex: Send + Sync {
    /// The classifier array, in id order.
    fn classifier_ids(&self) -> &[String];

    /// `None` for the null id.
    fn get_string(&self, id: i32) -> Result<Option<&str>>;

    /// Number of other strings.
    fn other_count(&self) -> usize;
}

fn read_classifiers(reader: &dyn FileReader, name: Option<&str>) -> Result<Vec<String>> {
    let bytes = reader.read_file(&metadata::classifier_strings_path(name))?;
    Ok(bincode::deserialize(&bytes)?)
}

fn read_header(reader: &dyn FileReader, name: Option<&str>) -> Result<OtherStringsHeader> {
    let path = metadata::other_strings_header_path(name);
    let header: OtherStringsHeader = bincode::deserialize(&reader.read_file(&path)?)?;
    if header.count > 0 && header.partition_size == 0 {
        return Err(SerializationError::Corrupt {
            path,
            reason: "partition size is zero".to_string(),
        });
    }
    Ok(header)
}

fn read_partition(reader: &dyn FileReader, name: Option<&str>, start: usize, expected: usize) -> Result<Vec<String>> {
    let path = metadata::other_strings_partition_path(name, start);
    let strings: Vec<String> = bincode::deserialize(&reader.read_file(&path)?)?;
    if strings.len() != expected {
        return Err(SerializationError::Corrupt {
            path,
            reason: format!("expected {expected} strings, found {}", strings.len()),
        });
    }
    Ok(strings)
}

fn classifier_string(classifiers: &[String], id: i32) -> Result<Option<&str>> {
    classifiers
        .get(id_to_classifier_index(id))
        .map(|s| Some(s.as_str()))
        .ok_or(SerializationError::UnknownStringId(id))
}

// ── Eager ───────────────────────────────────────────────

/// Every string held in memory.
#[derive(Debug, Clone)]
pub struct EagerStringIndex {
    classifiers: Vec<String>,
    other: Vec<String>,
}

impl EagerStringIndex {
    pub fn load(reader: &dyn FileReader, name: Option<&str>) -> Result<Self> {
        let classifiers = read_classifiers(reader, name)?;
        let header = read_header(reader, name)?;
        let count = header.count as usize;
        let partition_size = header.partition_size as usize;
        let mut other = Vec::with_capacity(count);
        let mut start = 0;
        while start < count {
            let expected = partition_size.min(count - start);
            other.extend(read_partition(reader, name, start, expected)?);
            start += partition_size;
        }
        Ok(EagerStringIndex { classifiers, other })
    }

    pub fn from_cache(cache: &StringCache) -> Self {
        EagerStringIndex {
            classifiers: cache.classifier_strings().to_vec(),
            other: cache.other_strings().to_vec(),
        }
    }
}

impl StringIndex for EagerStringIndex {
    fn classifier_ids(&self) -> &[String] {
        &self.classifiers
    }

    fn get_string(&self, id: i32) -> Result<Option<&str>> {
        match id {
            0 => Ok(None),
            id if id < 0 => classifier_string(&self.classifiers, id),
            id => self
                .other
                .get(id_to_other_index(id))
                .map(|s| Some(s.as_str()))
                .ok_or(SerializationError::UnknownStringId(id)),
        }
    }

    fn other_count(&self) -> usize {
        self.other.len()
    }
}

// ── Lazy ────────────────────────────────────────────────

/// Classifier strings held in memory; other-string partitions read on first
/// access. Concurrent first reads of a partition may both decode it; one
/// result is kept.
pub struct LazyStringIndex {
    reader: Arc<dyn FileReader>,
    metadata_name: Option<String>,
    classifiers: Vec<String>,
    count: usize,
    partition_size: usize,
    partitions: Vec<OnceBox<Vec<String>>>,
}

impl std::fmt::Debug for LazyStringIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyStringIndex")
            .field("metadata_name", &self.metadata_name)
            .field("classifier_count", &self.classifiers.len())
            .field("other_count", &self.count)
            .field("loaded_partitions", &self.loaded_partitions())
            .finish()
    }
}

impl LazyStringIndex {
    pub fn load(reader: Arc<dyn FileReader>, metadata_name: Option<&str>) -> Result<Self> {
        let classifiers = read_classifiers(reader.as_ref(), metadata_name)?;
        let header = read_header(reader.as_ref(), metadata_name)?;
        let count = header.count as usize;
        let partition_size = (header.partition_size as usize).max(1);
        let partitions = (0..count.div_ceil(partition_size)).map(|_| OnceBox::new()).collect();
        Ok(LazyStringIndex {
            reader,
            metadata_name: metadata_name.map(str::to_string),
            classifiers,
            count,
            partition_size,
            partitions,
        })
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn loaded_partitions(&self) -> usize {
        self.partitions.iter().filter(|p| p.get().is_some()).count()
    }

    fn partition(&self, partition: usize) -> Result<&Vec<String>> {
        self.partitions[partition].get_or_try_init(|| -> Result<Box<Vec<String>>> {
            let start = partition * self.partition_size;
            let expected = self.partition_size.min(self.count - start);
            let strings = read_partition(self.reader.as_ref(), self.metadata_name.as_deref(), start, expected)?;
            tracing::debug!("Loaded string partition {} ({} strings)", start, strings.len());
            Ok(Box::new(strings))
        })
    }
}

impl StringIndex for LazyStringIndex {
    fn classifier_ids(&self) -> &[String] {
        &self.classifiers
    }

    fn get_string(&self, id: i32) -> Result<Option<&str>> {
        match id {
            0 => Ok(None),
            id if id < 0 => classifier_string(&self.classifiers, id),
            id => {
                let index = id_to_other_index(id);
                if index >= self.count {
                    return Err(SerializationError::UnknownStringId(id));
                }
                let strings = self.partition(index / self.partition_size)?;
                Ok(Some(strings[index % self.partition_size].as_str()))
            }
        }
    }

    fn other_count(&self) -> usize {
        self.count
    }
}
