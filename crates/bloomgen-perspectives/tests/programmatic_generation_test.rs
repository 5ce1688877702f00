// ABOUTME: End-to-end runs of the declaration-driven generator against a temp output directory
// ABOUTME: Covers the minimal Customer/Order perspective and rejection of undeclared labels

use bloomgen_core::{missing_required_fields, BloomError, Hydrator, PerspectiveWriter};
use bloomgen_perspectives::{
    CategoryDeclaration, PerspectiveDeclaration, ProgrammaticGenerator, PropertyDeclaration,
    RelationshipDeclaration,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;

fn category(label: &str, properties: &[&str]) -> CategoryDeclaration {
    CategoryDeclaration {
        label: label.to_string(),
        name: None,
        color: None,
        properties: properties
            .iter()
            .map(|name| PropertyDeclaration {
                name: name.to_string(),
                data_type: "string".to_string(),
            })
            .collect(),
    }
}

fn relationship(rel_type: &str, start: &str, end: &str) -> RelationshipDeclaration {
    RelationshipDeclaration {
        rel_type: rel_type.to_string(),
        start: start.to_string(),
        end: end.to_string(),
    }
}

fn declaration(relationships: Vec<RelationshipDeclaration>) -> PerspectiveDeclaration {
    PerspectiveDeclaration {
        name: "Customer Orders".to_string(),
        categories: vec![category("Customer", &["customer_id"]), category("Order", &["order_id"])],
        relationships,
        hidden_relationship_types: vec![],
    }
}

#[test]
fn customer_order_declaration_produces_minimal_perspective() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = PerspectiveWriter::new(dir.path());

    let path = ProgrammaticGenerator::new()
        .generate(
            &declaration(vec![relationship("PLACED", "Customer", "Order")]),
            &mut writer,
        )
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "Customer_Orders.json");
    let content = fs::read_to_string(&path).unwrap();
    assert!(!content.contains('\n'), "output should be minified");
    let doc: Value = serde_json::from_str(&content).unwrap();

    let labels: BTreeSet<&str> = doc["labels"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(labels, BTreeSet::from(["Customer", "Order"]));

    let rels = doc["relationshipTypes"].as_array().unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0]["name"], "PLACED");
    assert_eq!(rels[0]["size"], 1);
    assert_eq!(doc["hiddenRelationshipTypes"], serde_json::json!([]));

    assert!(missing_required_fields(&doc).is_empty());
}

#[test]
fn relationship_to_undeclared_label_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut writer = PerspectiveWriter::new(&out);

    let err = ProgrammaticGenerator::new()
        .generate(
            &declaration(vec![relationship("BILLED", "Order", "Invoice")]),
            &mut writer,
        )
        .unwrap_err();

    match err {
        BloomError::Config(message) => assert!(message.contains("Invoice")),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert!(!out.exists());
}

#[test]
fn built_perspective_is_stable_under_rehydration() {
    let hydrator = Hydrator::at(1_717_000_000_000);
    let doc = ProgrammaticGenerator::new()
        .with_hydrator(hydrator.clone())
        .build(&declaration(vec![relationship("PLACED", "Customer", "Order")]))
        .unwrap();

    assert_eq!(hydrator.hydrate_document(&doc).unwrap(), doc);
    assert_eq!(doc.created_at, 1_717_000_000_000);
}

#[test]
fn same_name_twice_gets_a_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = PerspectiveWriter::new(dir.path());
    let generator = ProgrammaticGenerator::new();
    let decl = declaration(vec![]);

    let first = generator.generate(&decl, &mut writer).unwrap();
    let second = generator.generate(&decl, &mut writer).unwrap();

    assert_ne!(first, second);
    assert_eq!(second.file_name().unwrap(), "Customer_Orders_2.json");
}
