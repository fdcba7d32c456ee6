//! Per-classifier metadata used by the id search

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use refgraph_core::{m3, ModelGraph, PropertyDescriptor, ReferenceConfig};

use crate::error::{ReferenceError, Result};

/// How the search treats one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub raw_type: Option<String>,
    pub to_one: bool,
    pub skip: bool,
}

/// Derived metadata for one classifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassInfo {
    properties: BTreeMap<String, PropertyInfo>,
    index_keys: Vec<String>,
}

impl ClassInfo {
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.get(name)
    }

    /// Properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyInfo)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Candidate key properties for addressing members of a to-many
    /// collection of this classifier, in priority order.
    pub fn index_keys(&self) -> &[String] {
        &self.index_keys
    }
}

/// Memoized `ClassInfo` per classifier, safe to share between threads.
pub struct ClassInfoCache {
    back_references: HashSet<String>,
    stub_classifiers: HashSet<String>,
    infos: DashMap<String, Arc<ClassInfo>>,
}

impl ClassInfoCache {
    pub fn new(config: &ReferenceConfig) -> Self {
        ClassInfoCache {
            back_references: config.back_references.iter().cloned().collect(),
            stub_classifiers: config.stub_classifiers.iter().cloned().collect(),
            infos: DashMap::new(),
        }
    }

    pub fn is_stub(&self, classifier: &str) -> bool {
        self.stub_classifiers.contains(classifier)
    }

    pub fn is_primitive(&self, classifier: &str) -> bool {
        m3::is_primitive_type(classifier)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn class_info(&self, graph: &ModelGraph, classifier: &str) -> Result<Arc<ClassInfo>> {
        if let Some(info) = self.infos.get(classifier) {
            return Ok(Arc::clone(info.value()));
        }
        let info = Arc::new(self.compute(graph, classifier)?);
        let entry = self.infos.entry(classifier.to_string()).or_insert(info);
        Ok(Arc::clone(entry.value()))
    }

    /// Index keys of a property's raw type. Raw types missing from the
    /// registry have none.
    pub fn index_keys(&self, graph: &ModelGraph, raw_type: &str) -> Result<Vec<String>> {
        match self.class_info(graph, raw_type) {
            Ok(info) => Ok(info.index_keys().to_vec()),
            Err(ReferenceError::UnknownClassifier(_)) => {
                tracing::debug!("No class info for raw type {}, indexing by position", raw_type);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn compute(&self, graph: &ModelGraph, classifier: &str) -> Result<ClassInfo> {
        let descriptor = graph
            .class_descriptor(classifier)
            .ok_or_else(|| ReferenceError::UnknownClassifier(classifier.to_string()))?;

        let mut properties: BTreeMap<String, PropertyInfo> = graph
            .types()
            .simple_properties(&descriptor.path)
            .into_iter()
            .map(|(name, property)| {
                let info = self.property_info(&property);
                (name, info)
            })
            .collect();

        // Enumeration.values is typed by a parameter; its members are always Enum.
        if classifier == m3::ENUMERATION {
            if let Some(values) = properties.get_mut(m3::VALUES) {
                if values.raw_type.is_none() {
                    *values = PropertyInfo {
                        raw_type: Some(m3::ENUM.to_string()),
                        to_one: false,
                        skip: false,
                    };
                }
            }
        }

        let index_keys = index_keys(&descriptor.path, &properties);
        tracing::debug!(
            "Computed class info for {}: {} properties, index keys {:?}",
            classifier,
            properties.len(),
            index_keys
        );
        Ok(ClassInfo {
            properties,
            index_keys,
        })
    }

    fn property_info(&self, property: &PropertyDescriptor) -> PropertyInfo {
        let raw_type = property.generic_type.raw_type.clone();
        let back_reference = self.back_references.contains(&property.qualified_name());
        if property.multiplicity.is_to_one() {
            return PropertyInfo {
                raw_type,
                to_one: true,
                skip: back_reference,
            };
        }
        let skip = raw_type
            .as_deref()
            .is_some_and(|t| m3::is_primitive_type(t) || back_reference);
        PropertyInfo {
            raw_type,
            to_one: false,
            skip,
        }
    }
}

fn index_keys(classifier: &str, properties: &BTreeMap<String, PropertyInfo>) -> Vec<String> {
    let keys: &[&str] = match classifier {
        m3::QUALIFIED_PROPERTY => &[m3::ID],
        m3::STEREOTYPE | m3::TAG => &[m3::VALUE],
        _ if is_possible_index_key(properties.get(m3::NAME)) => {
            if is_possible_index_key(properties.get(m3::ID)) {
                &[m3::NAME, m3::ID]
            } else {
                &[m3::NAME]
            }
        }
        _ if is_possible_index_key(properties.get(m3::ID)) => &[m3::ID],
        _ => &[],
    };
    keys.iter().map(|k| k.to_string()).collect()
}

fn is_possible_index_key(info: Option<&PropertyInfo>) -> bool {
    info.is_some_and(|p| p.to_one && p.raw_type.as_deref() == Some("String"))
}
