// ABOUTME: Checks hydration invariants on realistic partial perspectives
// ABOUTME: Idempotence, non-overwriting defaults, icon/size presence and label closure

use bloomgen_core::{BloomError, Hydrator, NO_ICON};
use serde_json::{json, Number, Value};

fn llm_draft() -> Value {
    json!({
        "name": "Customer 360",
        "version": "2.21.0",
        "categories": [
            {"name": "Customer", "labels": ["Customer"], "color": "#FFE081",
             "properties": [{"name": "customer_id", "dataType": "string"}]},
            {"labels": ["`Order`"], "properties": ["order_id", "order_status"]}
        ],
        "labels": {
            "Customer": [{"propertyKey": "customer_id", "type": "Customer", "dataType": "string"}]
        },
        "relationshipTypes": [
            {"name": "PLACED", "start": "Customer", "end": "Order"},
            {"name": "BOUGHT", "size": 3}
        ],
        "templates": [
            {"name": "Customer orders", "query": "MATCH (c:Customer {customer_id: $id})-[:PLACED]->(o) RETURN c, o"}
        ]
    })
}

#[test]
fn hydration_is_idempotent() {
    let hydrator = Hydrator::at(1_700_000_000_000).with_known_relationship_types(vec![
        "PLACED".to_string(),
        "BOUGHT".to_string(),
        "HAS_REVIEW".to_string(),
    ]);

    let once = hydrator.hydrate(llm_draft()).unwrap();
    let twice = hydrator.hydrate_document(&once).unwrap();

    assert_eq!(once, twice);
    assert_eq!(
        serde_json::to_value(&once).unwrap(),
        serde_json::to_value(&twice).unwrap()
    );
}

#[test]
fn hydration_is_idempotent_across_clock_changes() {
    let first = Hydrator::at(1).hydrate(llm_draft()).unwrap();
    let second = Hydrator::at(2).hydrate_document(&first).unwrap();
    assert_eq!(first, second);
}

#[test]
fn present_size_is_not_overwritten() {
    let doc = Hydrator::at(0).hydrate(llm_draft()).unwrap();
    let bought = doc
        .relationship_types
        .iter()
        .find(|r| r.name == "BOUGHT")
        .unwrap();
    assert_eq!(bought.size, Number::from(3));

    let placed = doc
        .relationship_types
        .iter()
        .find(|r| r.name == "PLACED")
        .unwrap();
    assert_eq!(placed.size, Number::from(1));
}

#[test]
fn every_category_has_an_icon_and_every_relationship_a_size() {
    let value = serde_json::to_value(Hydrator::at(0).hydrate(llm_draft()).unwrap()).unwrap();

    for category in value["categories"].as_array().unwrap() {
        assert!(!category["icon"].is_null());
    }
    assert_eq!(value["categories"][1]["icon"], NO_ICON);

    for rel in value["relationshipTypes"].as_array().unwrap() {
        assert!(rel["size"].is_number());
    }
}

#[test]
fn relationship_endpoints_are_declared_labels() {
    let doc = Hydrator::at(0).hydrate(llm_draft()).unwrap();
    for rel in &doc.relationship_types {
        for label in [&rel.start, &rel.end].into_iter().flatten() {
            assert!(doc.labels.contains_key(label), "{} undeclared", label);
        }
    }
    // `Order` came only from its category
    assert_eq!(doc.labels["Order"].len(), 2);
}

#[test]
fn undeclared_endpoint_is_a_schema_violation() {
    let mut draft = llm_draft();
    draft["relationshipTypes"][0]["end"] = json!("Invoice");

    let err = Hydrator::at(0).hydrate(draft).unwrap_err();
    match err {
        BloomError::SchemaViolation { field, message } => {
            assert_eq!(field, "relationshipTypes[0].end");
            assert!(message.contains("Invoice"));
        }
        other => panic!("expected schema violation, got {other:?}"),
    }
}

#[test]
fn missing_path_segments_default_to_empty() {
    let mut draft = llm_draft();
    draft["metadata"] = json!({"indexes": [{"label": "Customer"}]});

    let doc = Hydrator::at(0).hydrate(draft).unwrap();
    assert!(doc.metadata.path_segments.is_empty());
    assert_eq!(doc.metadata.indexes.len(), 1);
}

#[test]
fn unknown_keys_pass_through() {
    let mut draft = llm_draft();
    draft["customFlag"] = json!({"keep": true});
    draft["categories"][0]["glyph"] = json!("star");

    let value = serde_json::to_value(Hydrator::at(0).hydrate(draft).unwrap()).unwrap();
    assert_eq!(value["customFlag"], json!({"keep": true}));
    assert_eq!(value["categories"][0]["glyph"], "star");
}
