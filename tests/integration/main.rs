//! Integration tests for refgraph
//!
//! These drive the whole pipeline: model document, reference ids,
//! resolution, serialization, and the CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use refgraph_core::{m3, LoadedModel, ModelDocument, ReferenceConfig};
use refgraph_reference::{ReferenceError, ReferenceIdProvider, ReferenceIdResolver};
use refgraph_serialization::{
    DirectoryFileReader, DirectoryFileWriter, DistributedBinaryGraphDeserializer,
    DistributedBinaryGraphSerializer, RValue, SerializerOptions,
};
use tempfile::TempDir;

const MODEL: &str = r#"{
  "elements": [
    {
      "key": "person",
      "classifier": "meta::pure::metamodel::type::Class",
      "name": "Person",
      "package": "model::domain",
      "span": { "source_id": "/model/domain.pure", "start_line": 1, "start_column": 1, "end_line": 10, "end_column": 1 },
      "properties": { "properties": [ { "ref": "firstName" }, { "ref": "lastName" } ] }
    },
    {
      "key": "firstName",
      "classifier": "meta::pure::metamodel::function::property::Property",
      "span": { "source_id": "/model/domain.pure", "start_line": 3, "start_column": 5, "end_line": 3, "end_column": 30 },
      "properties": {
        "name": [ { "string": "firstName" } ],
        "owner": [ { "ref": "person" } ],
        "genericType": [ { "ref": "firstNameType" } ]
      }
    },
    {
      "key": "firstNameType",
      "classifier": "meta::pure::metamodel::type::generics::GenericType",
      "span": { "source_id": "/model/domain.pure", "start_line": 3, "start_column": 16, "end_line": 3, "end_column": 22 },
      "properties": { "rawType": [ { "ref": "address" } ] }
    },
    {
      "key": "lastName",
      "classifier": "meta::pure::metamodel::function::property::Property",
      "span": { "source_id": "/model/domain.pure", "start_line": 4, "start_column": 5, "end_line": 4, "end_column": 30 },
      "properties": {
        "name": [ { "string": "lastName" } ],
        "owner": [ { "ref": "person" } ]
      }
    },
    {
      "key": "address",
      "classifier": "meta::pure::metamodel::type::Class",
      "name": "Address",
      "package": "model::domain",
      "span": { "source_id": "/model/domain.pure", "start_line": 12, "start_column": 1, "end_line": 20, "end_column": 1 }
    },
    {
      "key": "color",
      "classifier": "meta::pure::metamodel::type::Enumeration",
      "name": "Color",
      "package": "model::domain",
      "span": { "source_id": "/model/domain.pure", "start_line": 22, "start_column": 1, "end_line": 25, "end_column": 1 },
      "properties": { "values": [ { "ref": "red" }, { "ref": "green" } ] }
    },
    {
      "key": "red",
      "classifier": "model::domain::Color",
      "name": "RED",
      "span": { "source_id": "/model/domain.pure", "start_line": 23, "start_column": 3, "end_line": 23, "end_column": 6 },
      "properties": { "name": [ { "string": "RED" } ] }
    },
    {
      "key": "green",
      "classifier": "model::domain::Color",
      "name": "GREEN",
      "span": { "source_id": "/model/domain.pure", "start_line": 24, "start_column": 3, "end_line": 24, "end_column": 8 },
      "properties": { "name": [ { "string": "GREEN" } ] }
    }
  ]
}"#;

fn load() -> LoadedModel {
    ModelDocument::from_json(MODEL).unwrap().into_graph().unwrap()
}

fn write_model(dir: &Path) -> PathBuf {
    let path = dir.join("model.json");
    fs::write(&path, MODEL).unwrap();
    path
}

fn refgraph(dir: &Path, args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_refgraph"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute refgraph");
    assert!(
        output.status.success(),
        "refgraph {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ── Reference ids ───────────────────────────────────────

#[test]
fn test_ids_for_class() {
    let model = load();
    let provider = ReferenceIdProvider::new(&model.graph, &ReferenceConfig::default()).unwrap();

    let expected = BTreeMap::from([
        ("person", "model::domain::Person"),
        ("firstName", "model::domain::Person.properties[name=firstName]"),
        ("firstNameType", "model::domain::Person.properties[name=firstName].genericType"),
        ("lastName", "model::domain::Person.properties[name=lastName]"),
    ]);
    for (key, id) in expected {
        assert_eq!(provider.reference_id(model.node(key).unwrap()).unwrap(), id, "{key}");
    }
    assert_eq!(
        provider.reference_id(model.node("red").unwrap()).unwrap(),
        "model::domain::Color.values[name=RED]"
    );

    let person = model.node("person").unwrap();
    let ids = provider.ids_for_owner(person).unwrap();
    assert_eq!(ids.len(), 4);
    assert!(!ids.contains_key(&model.node("address").unwrap()));
}

#[test]
fn test_every_id_resolves_back() {
    let model = load();
    let provider = ReferenceIdProvider::new(&model.graph, &ReferenceConfig::default()).unwrap();
    let elements = model.graph.packageable_elements();
    provider.precompute(&elements).unwrap();
    assert_eq!(provider.cached_owner_count(), elements.len());

    let resolver = provider.resolver();
    let mut checked = 0;
    for element in elements {
        for (node, id) in provider.ids_for_owner(element).unwrap().iter() {
            assert_eq!(resolver.resolve_reference(id).unwrap(), *node, "{id}");
            checked += 1;
        }
    }
    assert!(checked >= 10);
}

#[test]
fn test_ids_survive_reload() {
    let first = load();
    let second = load();
    let config = ReferenceConfig::default();
    let first_provider = ReferenceIdProvider::new(&first.graph, &config).unwrap();
    let second_provider = ReferenceIdProvider::new(&second.graph, &config).unwrap();
    for key in ["firstName", "firstNameType", "lastName", "green"] {
        assert_eq!(
            first_provider.reference_id(first.node(key).unwrap()).unwrap(),
            second_provider.reference_id(second.node(key).unwrap()).unwrap()
        );
    }
}

#[test]
fn test_resolution_errors() {
    let model = load();
    let resolver = ReferenceIdResolver::new(&model.graph);

    let err = resolver
        .resolve_reference("model::domain::Person.properties[name=middleName]")
        .unwrap_err();
    assert!(matches!(err, ReferenceError::UnresolvableReferenceId { .. }));

    let err = resolver.resolve_reference("model::domain::Person.properties[").unwrap_err();
    assert!(matches!(err, ReferenceError::InvalidReferenceId { .. }));

    let err = resolver.resolve_reference("model::domain::Nobody").unwrap_err();
    assert!(matches!(err, ReferenceError::UnresolvableReferenceId { .. }));
}

// ── Serialization ───────────────────────────────────────

#[test]
fn test_serialize_and_read_back() {
    let model = load();
    let dir = TempDir::new().unwrap();
    let mut writer = DirectoryFileWriter::new(dir.path());
    let summary = DistributedBinaryGraphSerializer::new(&model.graph, SerializerOptions::default().with_metadata_name("domain"))
        .unwrap()
        .serialize(&mut writer)
        .unwrap();
    assert_eq!(summary.objects, model.graph.node_count());

    let deserializer = DistributedBinaryGraphDeserializer::builder(Arc::new(DirectoryFileReader::new(dir.path())))
        .with_metadata_name("domain")
        .with_obj_validation(true)
        .build()
        .unwrap();
    let person = deserializer.get_instance(m3::CLASS, "model::domain::Person").unwrap();
    let properties = person.property("properties").unwrap();
    assert_eq!(properties.len(), 2);
    let RValue::ObjRef { classifier, identifier } = &properties[0] else {
        panic!("expected an object reference, found {:?}", properties[0]);
    };
    assert_eq!(classifier, m3::PROPERTY);
    let first_name = deserializer.get_instance(classifier, identifier).unwrap();
    assert_eq!(first_name.property("owner").unwrap().len(), 1);

    let color = deserializer.get_instance(m3::ENUMERATION, "model::domain::Color").unwrap();
    assert_eq!(
        color.property("values").unwrap()[1],
        RValue::EnumRef {
            enumeration: "model::domain::Color".to_string(),
            name: "GREEN".to_string(),
        }
    );
    assert_eq!(
        deserializer.classifier_instance_ids("model::domain::Color").unwrap(),
        vec!["GREEN".to_string(), "RED".to_string()]
    );
}

// ── CLI ─────────────────────────────────────────────────

#[test]
fn test_cli_ids_and_resolve() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path());
    let model = model.to_str().unwrap();

    let stdout = refgraph(dir.path(), &["ids", model, "--element", "model::domain::Person"]);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines.contains(&"model::domain::Person.properties[name=lastName]\tmeta::pure::metamodel::function::property::Property"));

    let stdout = refgraph(dir.path(), &["resolve", model, "model::domain::Color.values[name=GREEN]"]);
    assert_eq!(stdout.trim(), "model::domain::Color.values[name=GREEN]\tmodel::domain::Color\tGREEN");
}

#[test]
fn test_cli_serialize_with_config() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path());
    fs::write(
        dir.path().join("refgraph.toml"),
        "[serialization]\nmetadata_name = \"domain\"\nmax_partition_bytes = 128\n",
    )
    .unwrap();

    refgraph(dir.path(), &["serialize", model.to_str().unwrap(), "out"]);
    assert!(dir.path().join("out/metadata/specs/domain.json").is_file());
    assert!(dir.path().join("out/metadata/bin/domain/1.bin").is_file());

    let stdout = refgraph(dir.path(), &["inspect", "out", "--name", "domain"]);
    assert!(stdout.lines().any(|l| l == "meta::pure::metamodel::type::Class\t2"));
    assert!(stdout.lines().any(|l| l == "model::domain::Color\t2"));
}

#[test]
fn test_cli_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    let model = write_model(dir.path());
    fs::write(dir.path().join("refgraph.toml"), "[serialization]\nunknown = 1\n").unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_refgraph"))
        .args(["ids", model.to_str().unwrap()])
        .current_dir(dir.path())
        .output()
        .expect("Failed to execute refgraph");
    assert!(!output.status.success());
}
