//! Test utilities for refgraph-core

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A small model: a `test::Widget` class descriptor with two properties, and a
/// `model::domain::Person` class element owning one property.
pub const SAMPLE_MODEL: &str = r#"{
  "classes": [
    {
      "path": "test::Widget",
      "generalizations": ["meta::pure::metamodel::type::Any"],
      "properties": [
        {
          "name": "name",
          "generic_type": { "raw_type": "String" },
          "multiplicity": { "lower": 1, "upper": 1 }
        },
        {
          "name": "parts",
          "generic_type": { "raw_type": "test::Widget" },
          "multiplicity": { "lower": 0, "upper": null }
        }
      ]
    }
  ],
  "elements": [
    {
      "key": "person",
      "classifier": "meta::pure::metamodel::type::Class",
      "name": "Person",
      "package": "model::domain",
      "span": { "source_id": "/model/domain.pure", "start_line": 1, "start_column": 1, "end_line": 10, "end_column": 1 },
      "properties": {
        "properties": [ { "ref": "firstName" } ]
      }
    },
    {
      "key": "firstName",
      "classifier": "meta::pure::metamodel::function::property::Property",
      "span": { "source_id": "/model/domain.pure", "start_line": 3, "start_column": 5, "end_line": 3, "end_column": 30 },
      "properties": {
        "name": [ { "string": "firstName" } ],
        "owner": [ { "ref": "person" } ]
      }
    }
  ]
}"#;

/// Write `SAMPLE_MODEL` into a fresh temp dir.
pub fn write_sample_model() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("model.json");
    fs::write(&path, SAMPLE_MODEL).unwrap();
    (temp_dir, path)
}
