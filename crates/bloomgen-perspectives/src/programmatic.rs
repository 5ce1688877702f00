// ABOUTME: Builds a perspective directly from a declaration file, without any network call
// ABOUTME: Declarations are validated completely before a document is produced

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use bloomgen_core::{
    BloomError, Hydrator, IndexDescriptor, PerspectiveDocument, PerspectiveWriter, Result,
    SchemaSnapshot, HIDDEN_RELATIONSHIP_COLOR, NO_ICON,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// A perspective described by hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveDeclaration {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<CategoryDeclaration>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDeclaration>,
    /// Relationship types Bloom should know about but not display
    #[serde(default, alias = "hidden", alias = "hiddenRelationshipTypes")]
    pub hidden_relationship_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDeclaration {
    pub label: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(default = "default_data_type", alias = "dataType")]
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDeclaration {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start: String,
    pub end: String,
}

fn default_data_type() -> String {
    "string".to_string()
}

impl PerspectiveDeclaration {
    /// Read a declaration from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BloomError::Config(format!("Failed to read declaration {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                BloomError::Config(format!("Invalid declaration {}: {}", path.display(), e))
            }),
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                BloomError::Config(format!("Invalid declaration {}: {}", path.display(), e))
            }),
            _ => Err(BloomError::Config(format!(
                "Unsupported declaration format for {} (expected .toml or .json)",
                path.display()
            ))),
        }
    }

    fn declared_types(&self) -> BTreeSet<&str> {
        self.relationships.iter().map(|r| r.rel_type.as_str()).collect()
    }
}

/// Turns declarations into complete perspectives
#[derive(Debug, Clone, Default)]
pub struct ProgrammaticGenerator<'a> {
    schema: Option<&'a SchemaSnapshot>,
    hide_unused: bool,
    hydrator: Hydrator,
}

impl<'a> ProgrammaticGenerator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin document timestamps
    pub fn with_hydrator(mut self, hydrator: Hydrator) -> Self {
        self.hydrator = hydrator;
        self
    }

    /// Add every schema label to root `labels` and, with `hide_unused`, hide every schema
    /// relationship type the declaration does not use
    pub fn with_schema(mut self, schema: &'a SchemaSnapshot, hide_unused: bool) -> Self {
        self.schema = Some(schema);
        self.hide_unused = hide_unused;
        self
    }

    /// Validate and build, then write through `writer`
    pub fn generate(
        &self,
        declaration: &PerspectiveDeclaration,
        writer: &mut PerspectiveWriter,
    ) -> Result<PathBuf> {
        let document = self.build(declaration)?;
        writer.write(&document)
    }

    pub fn build(&self, declaration: &PerspectiveDeclaration) -> Result<PerspectiveDocument> {
        self.validate(declaration)?;
        let hidden = self.hidden_types(declaration)?;
        let ts = self.hydrator.timestamp_ms();

        let mut labels = Map::new();
        if let Some(schema) = self.schema {
            for (label, properties) in &schema.labels {
                let entries: Vec<Value> = properties
                    .iter()
                    .map(|p| label_property(&p.name, label, &p.bloom_data_type()))
                    .collect();
                labels.insert(label.clone(), Value::Array(entries));
            }
        }

        let mut categories = Vec::new();
        let mut indexes = Vec::new();
        for (idx, category) in declaration.categories.iter().enumerate() {
            let label = &category.label;
            let mut entry = json!({
                "id": idx + 1,
                "name": category.name.clone().unwrap_or_else(|| label.clone()),
                "labels": [label],
                "properties": category.properties.iter().map(|p| json!({
                    "name": p.name,
                    "exclude": false,
                    "dataType": p.data_type,
                })).collect::<Vec<_>>(),
                "createdAt": ts,
                "lastEditedAt": ts,
                "icon": NO_ICON,
                "size": 1,
                "textSize": 1,
                "captionKeys": [],
                "styleRules": [],
            });
            if let Some(color) = &category.color {
                entry["color"] = json!(color);
            }
            categories.push(entry);

            labels.entry(label.clone()).or_insert_with(|| {
                Value::Array(
                    category
                        .properties
                        .iter()
                        .map(|p| label_property(&p.name, label, &p.data_type))
                        .collect(),
                )
            });

            indexes.push(IndexDescriptor::native(
                label,
                category.properties.iter().map(|p| p.name.as_str()),
            ));
        }

        let mut relationship_types = Vec::new();
        let mut seen = HashSet::new();
        for rel in &declaration.relationships {
            if !seen.insert(rel.rel_type.as_str()) {
                debug!("Relationship type {} declared more than once, keeping the first", rel.rel_type);
                continue;
            }
            relationship_types.push(json!({
                "name": rel.rel_type,
                "size": 1,
                "start": rel.start,
                "end": rel.end,
            }));
        }
        for rel_type in &hidden {
            relationship_types.push(json!({
                "name": rel_type,
                "color": HIDDEN_RELATIONSHIP_COLOR,
                "size": 1,
            }));
        }

        let raw = json!({
            "name": declaration.name,
            "categories": categories,
            "labels": labels,
            "relationshipTypes": relationship_types,
            "hiddenRelationshipTypes": hidden,
            "metadata": {"pathSegments": [], "indexes": indexes},
        });

        let document = self.hydrator.hydrate(raw)?;
        info!(
            "Built perspective '{}': {} categories, {} relationship types, {} hidden",
            document.name,
            document.categories.len(),
            document.relationship_types.len(),
            document.hidden_relationship_types.len()
        );
        Ok(document)
    }

    fn validate(&self, declaration: &PerspectiveDeclaration) -> Result<()> {
        if declaration.name.trim().is_empty() {
            return Err(BloomError::Config("declaration has an empty name".to_string()));
        }

        let mut categorised: BTreeSet<&str> = BTreeSet::new();
        for category in &declaration.categories {
            if category.label.trim().is_empty() {
                return Err(BloomError::Config("category with an empty label".to_string()));
            }
            if !categorised.insert(category.label.as_str()) {
                return Err(BloomError::Config(format!(
                    "label {} is declared by more than one category",
                    category.label
                )));
            }
        }
        // Schema labels only enrich root `labels`; endpoints need a category.
        for rel in &declaration.relationships {
            for (side, label) in [("start", &rel.start), ("end", &rel.end)] {
                if !categorised.contains(label.as_str()) {
                    return Err(BloomError::Config(format!(
                        "relationship {} references undeclared {} label {}",
                        rel.rel_type, side, label
                    )));
                }
            }
        }
        Ok(())
    }

    /// Explicit hidden types, plus the unused schema types when requested
    fn hidden_types(&self, declaration: &PerspectiveDeclaration) -> Result<Vec<String>> {
        let declared = declaration.declared_types();
        let mut hidden: Vec<String> = Vec::new();

        for rel_type in &declaration.hidden_relationship_types {
            if declared.contains(rel_type.as_str()) {
                return Err(BloomError::Config(format!(
                    "relationship type {} is both declared and hidden",
                    rel_type
                )));
            }
            if !hidden.contains(rel_type) {
                hidden.push(rel_type.clone());
            }
        }

        if self.hide_unused {
            if let Some(schema) = self.schema {
                for rel_type in schema.relationship_type_names() {
                    if !declared.contains(rel_type.as_str()) && !hidden.contains(&rel_type) {
                        hidden.push(rel_type);
                    }
                }
            }
        }
        Ok(hidden)
    }
}

fn label_property(key: &str, label: &str, data_type: &str) -> Value {
    json!({"propertyKey": key, "type": label, "dataType": data_type})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_orders() -> PerspectiveDeclaration {
        PerspectiveDeclaration {
            name: "Customer Orders".to_string(),
            categories: vec![
                CategoryDeclaration {
                    label: "Customer".to_string(),
                    name: None,
                    color: Some("#FFE081".to_string()),
                    properties: vec![PropertyDeclaration {
                        name: "customer_id".to_string(),
                        data_type: "string".to_string(),
                    }],
                },
                CategoryDeclaration {
                    label: "Order".to_string(),
                    name: Some("Orders".to_string()),
                    color: None,
                    properties: vec![],
                },
            ],
            relationships: vec![RelationshipDeclaration {
                rel_type: "PLACED".to_string(),
                start: "Customer".to_string(),
                end: "Order".to_string(),
            }],
            hidden_relationship_types: vec![],
        }
    }

    #[test]
    fn test_categories_carry_indexes_and_captions() {
        let doc = ProgrammaticGenerator::new().build(&customer_orders()).unwrap();

        assert_eq!(doc.categories[0].captions[0].key, "customer_id");
        assert_eq!(doc.categories[0].captions[0].is_gds_data, Some(false));
        assert_eq!(doc.categories[1].name, "Orders");
        assert_eq!(doc.categories[1].captions[0].caption_type, "label");
        assert_eq!(doc.metadata.indexes.len(), 2);
        assert_eq!(doc.metadata.indexes[0]["propertyKeys"][0]["key"], "customer_id");
        assert_eq!(doc.metadata.indexes[0]["type"], "native");
    }

    #[test]
    fn test_duplicate_category_label_is_rejected() {
        let mut declaration = customer_orders();
        declaration.categories[1].label = "Customer".to_string();
        let err = ProgrammaticGenerator::new().build(&declaration).unwrap_err();
        assert!(matches!(err, BloomError::Config(_)));
    }

    #[test]
    fn test_hidden_types_are_listed_in_grey() {
        let mut declaration = customer_orders();
        declaration.hidden_relationship_types = vec!["HAS_REVIEW".to_string()];
        let doc = ProgrammaticGenerator::new().build(&declaration).unwrap();

        assert_eq!(doc.hidden_relationship_types, vec!["HAS_REVIEW"]);
        let hidden = &doc.relationship_types[1];
        assert_eq!(hidden.name, "HAS_REVIEW");
        assert_eq!(hidden.color, HIDDEN_RELATIONSHIP_COLOR);
        assert_eq!(doc.visible_relationship_names(), vec!["PLACED"]);
    }

    #[test]
    fn test_declared_and_hidden_conflict() {
        let mut declaration = customer_orders();
        declaration.hidden_relationship_types = vec!["PLACED".to_string()];
        assert!(ProgrammaticGenerator::new().build(&declaration).is_err());
    }

    #[test]
    fn test_schema_enrichment_adds_labels_and_unused_types() {
        let mut schema = SchemaSnapshot::default();
        schema.labels.insert(
            "Review".to_string(),
            vec![bloomgen_core::PropertySpec::new("review_score", "Long")],
        );
        schema.labels.insert("Customer".to_string(), vec![]);
        schema.labels.insert("Order".to_string(), vec![]);
        schema.relationship_types.insert("PLACED".to_string());
        schema.relationship_types.insert("HAS_REVIEW".to_string());

        let doc = ProgrammaticGenerator::new()
            .with_schema(&schema, true)
            .build(&customer_orders())
            .unwrap();

        assert_eq!(doc.labels["Review"][0].data_type, "bigint");
        assert_eq!(doc.hidden_relationship_types, vec!["HAS_REVIEW"]);

        let without_hiding = ProgrammaticGenerator::new()
            .with_schema(&schema, false)
            .build(&customer_orders())
            .unwrap();
        assert!(without_hiding.hidden_relationship_types.is_empty());
    }

    #[test]
    fn test_schema_label_without_category_is_not_an_endpoint() {
        let mut schema = SchemaSnapshot::default();
        schema.labels.insert("Customer".to_string(), vec![]);
        schema.labels.insert("Invoice".to_string(), vec![]);

        let mut declaration = customer_orders();
        declaration.categories.truncate(1);
        declaration.relationships = vec![RelationshipDeclaration {
            rel_type: "BILLED".to_string(),
            start: "Customer".to_string(),
            end: "Invoice".to_string(),
        }];

        let err = ProgrammaticGenerator::new()
            .with_schema(&schema, false)
            .build(&declaration)
            .unwrap_err();
        match err {
            BloomError::Config(message) => assert!(message.contains("Invoice")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_declaration_formats() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("orders.toml");
        fs::write(
            &toml_path,
            r#"
name = "Customer Orders"
hidden = ["HAS_REVIEW"]

[[categories]]
label = "Customer"
properties = [{ name = "customer_id", dataType = "string" }]

[[categories]]
label = "Order"

[[relationships]]
type = "PLACED"
start = "Customer"
end = "Order"
"#,
        )
        .unwrap();
        let from_toml = PerspectiveDeclaration::load(&toml_path).unwrap();
        assert_eq!(from_toml.categories.len(), 2);
        assert_eq!(from_toml.hidden_relationship_types, vec!["HAS_REVIEW"]);

        let json_path = dir.path().join("orders.json");
        fs::write(&json_path, serde_json::to_string(&from_toml).unwrap()).unwrap();
        assert_eq!(PerspectiveDeclaration::load(&json_path).unwrap(), from_toml);

        let yaml_path = dir.path().join("orders.yaml");
        fs::write(&yaml_path, "name: x").unwrap();
        assert!(matches!(
            PerspectiveDeclaration::load(&yaml_path),
            Err(BloomError::Config(_))
        ));
    }
}
