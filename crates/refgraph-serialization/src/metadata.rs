//! Metadata names, file layout, and metadata specifications
//!
//! ```text
//! metadata/specs/<name>.json
//! metadata/bin/[<name>/]<partition>.bin
//! metadata/classifiers/[<name>/]<classifier with :: as />.idx
//! metadata/strings/[<name>/]classifiers.idx
//! metadata/strings/[<name>/]other.idx
//! metadata/strings/[<name>/]other-<start>.idx
//! ```

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SerializationError};
use crate::files::{FileReader, FileWriter};

pub const METADATA_DIR: &str = "metadata";

static METADATA_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid regex"));

pub fn is_valid_metadata_name(name: &str) -> bool {
    METADATA_NAME.is_match(name)
}

pub fn validate_metadata_name(name: &str) -> Result<&str> {
    if is_valid_metadata_name(name) {
        Ok(name)
    } else {
        Err(SerializationError::InvalidMetadataName(name.to_string()))
    }
}

fn dir(kind: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{METADATA_DIR}/{kind}/{name}/"),
        None => format!("{METADATA_DIR}/{kind}/"),
    }
}

pub fn partition_file_path(name: Option<&str>, partition: u32) -> String {
    format!("{}{partition}.bin", dir("bin", name))
}

pub fn classifier_index_path(name: Option<&str>, classifier: &str) -> String {
    format!("{}{}.idx", dir("classifiers", name), classifier.replace("::", "/"))
}

pub fn classifier_strings_path(name: Option<&str>) -> String {
    format!("{}classifiers.idx", dir("strings", name))
}

pub fn other_strings_header_path(name: Option<&str>) -> String {
    format!("{}other.idx", dir("strings", name))
}

pub fn other_strings_partition_path(name: Option<&str>, start: usize) -> String {
    format!("{}other-{start}.idx", dir("strings", name))
}

pub fn specification_path(name: &str) -> String {
    format!("{METADATA_DIR}/specs/{name}.json")
}

// ── Specification ───────────────────────────────────────

/// Name of a metadata set and the names it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSpecification {
    name: String,
    #[serde(default)]
    dependencies: BTreeSet<String>,
}

impl MetadataSpecification {
    pub fn new<I, S>(name: impl Into<String>, dependencies: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = MetadataSpecification {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    fn validate(&self) -> Result<()> {
        validate_metadata_name(&self.name)?;
        let invalid: Vec<String> = self
            .dependencies
            .iter()
            .filter(|d| !is_valid_metadata_name(d))
            .map(|d| format!("{d:?}"))
            .collect();
        match invalid.len() {
            0 => {}
            1 => {
                return Err(SerializationError::InvalidMetadataSpecification(format!(
                    "Invalid dependency: {}",
                    invalid[0]
                )))
            }
            _ => {
                return Err(SerializationError::InvalidMetadataSpecification(format!(
                    "Invalid dependencies: {}",
                    invalid.join(", ")
                )))
            }
        }
        if self.dependencies.contains(&self.name) {
            return Err(SerializationError::InvalidMetadataSpecification(format!(
                "{} cannot depend on itself",
                self.name
            )));
        }
        Ok(())
    }

    /// Write as JSON; returns the path written.
    pub fn write(&self, writer: &mut dyn FileWriter) -> Result<String> {
        let path = specification_path(&self.name);
        writer.write_file(&path, &serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }

    pub fn read(reader: &dyn FileReader, name: &str) -> Result<Self> {
        let path = specification_path(validate_metadata_name(name)?);
        let spec: MetadataSpecification = serde_json::from_slice(&reader.read_file(&path)?)?;
        spec.validate()?;
        if spec.name != name {
            return Err(SerializationError::InvalidMetadataSpecification(format!(
                "{path} declares name {:?}",
                spec.name
            )));
        }
        Ok(spec)
    }

    /// The named specifications plus everything they transitively depend on.
    /// Any missing specification is an error.
    pub fn load_with_dependencies<I, S>(reader: &dyn FileReader, names: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut to_load: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        let mut visited = HashSet::new();
        let mut specs = Vec::new();
        while let Some(name) = to_load.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let spec = Self::read(reader, &name)?;
            to_load.extend(spec.dependencies.iter().filter(|d| !visited.contains(*d)).cloned());
            specs.push(spec);
        }
        Ok(specs)
    }
}
