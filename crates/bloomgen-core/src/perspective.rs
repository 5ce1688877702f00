// ABOUTME: Typed Neo4j Bloom perspective document and its import contract
// ABOUTME: Key names are the Bloom wire format; unknown keys pass through untouched

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Bloom release the generated documents target
pub const BLOOM_VERSION: &str = "2.21.0";
pub const STANDARD_PERSPECTIVE: &str = "STANDARD_PERSPECTIVE";
/// Icon sentinel accepted by Bloom in place of an icon asset id
pub const NO_ICON: &str = "no-icon";
pub const DEFAULT_CATEGORY_COLOR: &str = "#CCCCCC";
pub const DEFAULT_RELATIONSHIP_COLOR: &str = "#A5ABB6";
pub const HIDDEN_RELATIONSHIP_COLOR: &str = "#959AA1";
pub const DEFAULT_TEXT_ALIGN: &str = "top";
pub const DEFAULT_PERSPECTIVE_NAME: &str = "Untitled Perspective";

/// Bloom's stock category palette
pub const DEFAULT_PALETTE: [&str; 14] = [
    "#FFE081", "#C990C0", "#F79767", "#57C7E3", "#F16667", "#D9C8AE", "#8DCC93", "#ECB5C9",
    "#4C8EDA", "#FFC454", "#DA7194", "#569480", "#959AA1", "#D9D9D9",
];

/// A complete perspective, ready for Bloom's import feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveDocument {
    pub name: String,
    pub version: String,
    pub id: Value,
    pub created_at: i64,
    pub last_edited_at: i64,
    #[serde(rename = "type")]
    pub perspective_type: String,
    pub hide_uncategorised_data: bool,
    pub max_limit_toast_msg_enabled: bool,
    pub parent_perspective_id: Option<String>,
    pub categories: Vec<Category>,
    /// Root-level schema of every label the perspective references
    pub labels: BTreeMap<String, Vec<LabelProperty>>,
    pub relationship_types: Vec<RelationshipType>,
    pub templates: Vec<Template>,
    pub scene_actions: Vec<Value>,
    pub hidden_relationship_types: Vec<String>,
    pub palette: Palette,
    pub metadata: Metadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Value,
    pub name: String,
    pub labels: Vec<String>,
    pub properties: Vec<CategoryProperty>,
    pub created_at: i64,
    pub last_edited_at: i64,
    pub color: String,
    pub icon: String,
    pub size: Number,
    pub text_size: Number,
    pub text_align: String,
    pub captions: Vec<Caption>,
    pub caption_keys: Vec<Value>,
    pub style_rules: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryProperty {
    pub name: String,
    pub exclude: bool,
    pub data_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    pub key: String,
    #[serde(rename = "type")]
    pub caption_type: String,
    pub is_caption: bool,
    pub in_tooltip: bool,
    pub styles: Vec<Value>,
    /// Only property captions carry this flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_gds_data: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Caption {
    pub fn property(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            caption_type: "property".to_string(),
            is_caption: true,
            in_tooltip: true,
            styles: Vec::new(),
            is_gds_data: Some(false),
            extra: Map::new(),
        }
    }

    pub fn label(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            caption_type: "label".to_string(),
            is_caption: true,
            in_tooltip: true,
            styles: Vec::new(),
            is_gds_data: None,
            extra: Map::new(),
        }
    }

    pub fn relationship(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            caption_type: "relationship".to_string(),
            is_caption: true,
            in_tooltip: true,
            styles: Vec::new(),
            is_gds_data: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelProperty {
    pub property_key: String,
    #[serde(rename = "type")]
    pub label: String,
    pub data_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipType {
    pub id: String,
    pub name: String,
    pub color: String,
    pub properties: Vec<Value>,
    pub size: Number,
    pub text_size: Number,
    pub text_align: String,
    pub captions: Vec<Caption>,
    pub caption_keys: Vec<Value>,
    pub style_rules: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Search phrase shown to the Bloom user
    pub text: String,
    pub cypher: String,
    pub created_at: i64,
    pub params: Vec<TemplateParam>,
    pub is_update_query: Option<bool>,
    pub is_write_transaction_checked: Option<bool>,
    pub has_cypher_errors: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParam {
    pub collapsed: bool,
    pub suggestion_boolean: bool,
    pub cypher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub colors: Vec<String>,
    pub current_index: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            current_index: 0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub path_segments: Vec<Value>,
    pub indexes: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `metadata.indexes` entry Bloom builds for a category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub property_keys: Vec<IndexPropertyKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPropertyKey {
    pub key: String,
    pub metadata_prop: bool,
}

impl IndexDescriptor {
    pub fn native<'a>(label: &str, keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            label: label.to_string(),
            kind: "native".to_string(),
            property_keys: keys
                .into_iter()
                .map(|key| IndexPropertyKey {
                    key: key.to_string(),
                    metadata_prop: false,
                })
                .collect(),
        }
    }
}

impl PerspectiveDocument {
    /// Relationship endpoints that are not keys of the root `labels` map,
    /// as `(field path, label)` pairs
    pub fn undeclared_labels(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for (idx, rel) in self.relationship_types.iter().enumerate() {
            for (side, label) in [("start", &rel.start), ("end", &rel.end)] {
                if let Some(label) = label {
                    if !self.labels.contains_key(label) {
                        missing.push((format!("relationshipTypes[{}].{}", idx, side), label.clone()));
                    }
                }
            }
        }
        missing
    }

    /// Names of the relationship types shown by this perspective
    pub fn visible_relationship_names(&self) -> Vec<&str> {
        self.relationship_types
            .iter()
            .map(|r| r.name.as_str())
            .filter(|name| !self.hidden_relationship_types.iter().any(|h| h == name))
            .collect()
    }
}

/// Keys of the Bloom import contract absent from `doc`, as field paths.
/// Presence only: a `parentPerspectiveId` of `null` counts as present.
pub fn missing_required_fields(doc: &Value) -> Vec<String> {
    let Some(root) = doc.as_object() else {
        return vec!["$".to_string()];
    };

    let mut missing = Vec::new();
    for key in [
        "labels",
        "categories",
        "relationshipTypes",
        "templates",
        "sceneActions",
        "hiddenRelationshipTypes",
        "maxLimitToastMsgEnabled",
        "parentPerspectiveId",
        "metadata",
    ] {
        if !root.contains_key(key) {
            missing.push(key.to_string());
        }
    }

    let non_null = |obj: &Map<String, Value>, key: &str| obj.get(key).is_some_and(|v| !v.is_null());

    let mut check_entries = |list: &str, keys: &[&str]| {
        if let Some(entries) = root.get(list).and_then(Value::as_array) {
            for (idx, entry) in entries.iter().enumerate() {
                for key in keys {
                    let present = entry.as_object().is_some_and(|obj| non_null(obj, key));
                    if !present {
                        missing.push(format!("{}[{}].{}", list, idx, key));
                    }
                }
            }
        }
    };
    check_entries("categories", &["icon"]);
    check_entries("relationshipTypes", &["size"]);
    check_entries("templates", &["cypher", "text"]);

    if let Some(metadata) = root.get("metadata") {
        for key in ["pathSegments", "indexes"] {
            let present = metadata.as_object().is_some_and(|obj| obj.contains_key(key));
            if !present {
                missing.push(format!("metadata.{}", key));
            }
        }
    }

    missing
}
