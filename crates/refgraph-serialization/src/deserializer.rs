//! Reading objects back from distributed binary metadata
//!
//! A deserializer reads one unnamed metadata set, or any number of named
//! ones. Classifier indexes are decoded on first use, once per classifier.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::codec::{decode_index, decode_obj, IndexEntry};
use crate::error::{Result, SerializationError};
use crate::files::FileReader;
use crate::metadata::{self, MetadataSpecification};
use crate::obj::Obj;
use crate::string_index::{EagerStringIndex, LazyStringIndex, StringIndex};

pub struct DeserializerBuilder {
    reader: Arc<dyn FileReader>,
    names: Option<Vec<String>>,
    with_dependencies: bool,
    validate_objs: bool,
    lazy_strings: bool,
}

impl DeserializerBuilder {
    /// Read this named metadata set, in addition to any already named.
    pub fn with_metadata_name(mut self, name: impl Into<String>) -> Self {
        self.names.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    /// Read exactly these named metadata sets. An empty list reads nothing.
    pub fn with_metadata_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Also read every metadata set the named ones depend on, per their
    /// specifications.
    pub fn with_dependencies(mut self, with_dependencies: bool) -> Self {
        self.with_dependencies = with_dependencies;
        self
    }

    /// Reject objects missing a classifier, identifier, or name.
    pub fn with_obj_validation(mut self, validate: bool) -> Self {
        self.validate_objs = validate;
        self
    }

    /// Load other-string partitions on demand (the default) or up front.
    pub fn with_lazy_strings(mut self, lazy: bool) -> Self {
        self.lazy_strings = lazy;
        self
    }

    pub fn build(self) -> Result<DistributedBinaryGraphDeserializer> {
        let sources = match self.names {
            None => vec![MetadataSource::open(Arc::clone(&self.reader), None, self.lazy_strings)?],
            Some(names) => {
                for name in &names {
                    metadata::validate_metadata_name(name)?;
                }
                let names = if self.with_dependencies {
                    MetadataSpecification::load_with_dependencies(self.reader.as_ref(), &names)?
                        .into_iter()
                        .map(|spec| spec.name().to_string())
                        .collect()
                } else {
                    names
                };
                let mut seen = BTreeSet::new();
                let mut sources = Vec::with_capacity(names.len());
                for name in names {
                    if seen.insert(name.clone()) {
                        sources.push(MetadataSource::open(
                            Arc::clone(&self.reader),
                            Some(name),
                            self.lazy_strings,
                        )?);
                    }
                }
                sources
            }
        };
        tracing::debug!("Opened {} metadata sets", sources.len());
        Ok(DistributedBinaryGraphDeserializer {
            sources,
            validate_objs: self.validate_objs,
        })
    }
}

pub struct DistributedBinaryGraphDeserializer {
    sources: Vec<MetadataSource>,
    validate_objs: bool,
}

impl std::fmt::Debug for DistributedBinaryGraphDeserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedBinaryGraphDeserializer")
            .field("metadata", &self.metadata_names())
            .field("classifier_count", &self.classifiers().len())
            .finish()
    }
}

impl DistributedBinaryGraphDeserializer {
    pub fn builder(reader: Arc<dyn FileReader>) -> DeserializerBuilder {
        DeserializerBuilder {
            reader,
            names: None,
            with_dependencies: false,
            validate_objs: false,
            lazy_strings: true,
        }
    }

    /// Names of the metadata sets read; `None` marks the unnamed set.
    pub fn metadata_names(&self) -> Vec<Option<&str>> {
        self.sources.iter().map(|s| s.name.as_deref()).collect()
    }

    pub fn has_classifier(&self, classifier: &str) -> bool {
        self.sources.iter().any(|s| s.has_classifier(classifier))
    }

    /// Every classifier with at least one serialized instance, sorted.
    pub fn classifiers(&self) -> Vec<String> {
        self.sources
            .iter()
            .flat_map(|s| s.indexes.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_instance(&self, classifier: &str, identifier: &str) -> Result<bool> {
        for source in self.sources_with(classifier)? {
            if source.index(classifier)?.contains_key(identifier) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Identifiers of every instance of `classifier`, sorted.
    pub fn classifier_instance_ids(&self, classifier: &str) -> Result<Vec<String>> {
        let mut ids = BTreeSet::new();
        for source in self.sources_with(classifier)? {
            ids.extend(source.index(classifier)?.keys().cloned());
        }
        Ok(ids.into_iter().collect())
    }

    pub fn get_instance(&self, classifier: &str, identifier: &str) -> Result<Obj> {
        self.get_instance_if_present(classifier, identifier)?
            .ok_or_else(|| SerializationError::UnknownInstance {
                classifier: classifier.to_string(),
                identifier: identifier.to_string(),
            })
    }

    /// `Ok(None)` when the classifier is known but the instance is not.
    pub fn get_instance_if_present(&self, classifier: &str, identifier: &str) -> Result<Option<Obj>> {
        for source in self.sources_with(classifier)? {
            if let Some(entry) = source.index(classifier)?.get(identifier) {
                let obj = source.read_obj(classifier, identifier, entry)?;
                if self.validate_objs {
                    obj.validate_fully_defined()?;
                }
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }

    pub fn get_instances<S: AsRef<str>>(&self, classifier: &str, identifiers: &[S]) -> Result<Vec<Obj>> {
        identifiers
            .iter()
            .map(|id| self.get_instance(classifier, id.as_ref()))
            .collect()
    }

    fn sources_with(&self, classifier: &str) -> Result<Vec<&MetadataSource>> {
        let sources: Vec<&MetadataSource> = self
            .sources
            .iter()
            .filter(|s| s.has_classifier(classifier))
            .collect();
        if sources.is_empty() {
            return Err(SerializationError::UnknownClassifier(classifier.to_string()));
        }
        Ok(sources)
    }
}

// ── Metadata sets ───────────────────────────────────────

type ClassifierIndex = BTreeMap<String, IndexEntry>;

struct MetadataSource {
    name: Option<String>,
    reader: Arc<dyn FileReader>,
    strings: Box<dyn StringIndex>,
    indexes: BTreeMap<String, OnceCell<ClassifierIndex>>,
}

impl MetadataSource {
    fn open(reader: Arc<dyn FileReader>, name: Option<String>, lazy_strings: bool) -> Result<Self> {
        let strings: Box<dyn StringIndex> = if lazy_strings {
            Box::new(LazyStringIndex::load(Arc::clone(&reader), name.as_deref())?)
        } else {
            Box::new(EagerStringIndex::load(reader.as_ref(), name.as_deref())?)
        };
        // Referenced-only classifiers are in the string array but have no index file
        let indexes = strings
            .classifier_ids()
            .iter()
            .filter(|c| reader.exists(&metadata::classifier_index_path(name.as_deref(), c)))
            .map(|c| (c.clone(), OnceCell::new()))
            .collect();
        Ok(MetadataSource {
            name,
            reader,
            strings,
            indexes,
        })
    }

    fn has_classifier(&self, classifier: &str) -> bool {
        self.indexes.contains_key(classifier)
    }

    fn index(&self, classifier: &str) -> Result<&ClassifierIndex> {
        let cell = self
            .indexes
            .get(classifier)
            .ok_or_else(|| SerializationError::UnknownClassifier(classifier.to_string()))?;
        cell.get_or_try_init(|| -> Result<ClassifierIndex> {
            let path = metadata::classifier_index_path(self.name.as_deref(), classifier);
            let mut index = BTreeMap::new();
            for entry in decode_index(&self.reader.read_file(&path)?)? {
                let identifier = self
                    .strings
                    .get_string(entry.identifier)?
                    .ok_or(SerializationError::UnknownStringId(entry.identifier))?;
                index.insert(identifier.to_string(), entry);
            }
            tracing::debug!("Loaded index for {} ({} instances)", classifier, index.len());
            Ok(index)
        })
    }

    fn read_obj(&self, classifier: &str, identifier: &str, entry: &IndexEntry) -> Result<Obj> {
        let path = metadata::partition_file_path(self.name.as_deref(), entry.partition);
        let bytes = self
            .reader
            .read_range(&path, u64::from(entry.offset), entry.length as usize)?;
        decode_obj(&bytes, classifier, identifier, self.strings.as_ref())
    }
}
