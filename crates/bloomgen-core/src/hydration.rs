// ABOUTME: Fills omitted Bloom perspective fields with fixed defaults and validates label closure
// ABOUTME: Works on the raw JSON map field by field, then deserializes into PerspectiveDocument

use serde_json::{json, Map, Number, Value};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

use crate::error::{BloomError, Result};
use crate::perspective::{
    Caption, Palette, PerspectiveDocument, BLOOM_VERSION, DEFAULT_CATEGORY_COLOR,
    DEFAULT_PERSPECTIVE_NAME, DEFAULT_RELATIONSHIP_COLOR, DEFAULT_TEXT_ALIGN, NO_ICON,
    STANDARD_PERSPECTIVE,
};

/// Strip the backticks Cypher uses for quoting; a list yields its first element
pub fn clean_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.replace('`', "")),
        Value::Array(items) => items.first().and_then(clean_label),
        Value::Null => None,
        other => Some(other.to_string().replace('`', "")),
    }
}

/// Insert `default` when `key` is absent or null. Present values are never replaced.
fn fill(map: &mut Map<String, Value>, key: &str, default: impl FnOnce() -> Value) {
    if map.get(key).map_or(true, Value::is_null) {
        map.insert(key.to_string(), default());
    }
}

/// Move `from` to `to` when only the former is present
fn rename(map: &mut Map<String, Value>, from: &str, to: &str) {
    if map.get(to).map_or(true, Value::is_null) {
        if let Some(value) = map.remove(from) {
            map.insert(to.to_string(), value);
        }
    }
}

fn take_array(map: &mut Map<String, Value>, key: &str, field: &str) -> Result<Vec<Value>> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(BloomError::violation(field, "expected a JSON array")),
    }
}

fn into_object(value: Value, field: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(BloomError::violation(field, "expected a JSON object")),
    }
}

fn caption_value(caption: Caption) -> Value {
    serde_json::to_value(caption).unwrap_or(Value::Null)
}

/// Post-processing shared by both generators.
///
/// Every field of the Bloom import contract that is missing (or null) gets its
/// fixed default; fields that are present are kept as they are, which makes
/// hydration idempotent. Referential problems are never defaulted away: a
/// relationship endpoint that is not a root-level label is a `SchemaViolation`.
#[derive(Debug, Clone)]
pub struct Hydrator {
    timestamp_ms: i64,
    known_relationship_types: BTreeSet<String>,
}

impl Default for Hydrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Hydrator {
    pub fn new() -> Self {
        Self::at(chrono::Utc::now().timestamp_millis())
    }

    /// Hydrator stamping a fixed creation time
    pub fn at(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            known_relationship_types: BTreeSet::new(),
        }
    }

    /// Relationship types of the database. When a document has no
    /// `hiddenRelationshipTypes`, the ones it does not use are hidden.
    pub fn with_known_relationship_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.known_relationship_types = types.into_iter().collect();
        self
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn hydrate(&self, raw: Value) -> Result<PerspectiveDocument> {
        self.hydrate_map(into_object(raw, "$")?)
    }

    pub fn hydrate_document(&self, doc: &PerspectiveDocument) -> Result<PerspectiveDocument> {
        self.hydrate(serde_json::to_value(doc)?)
    }

    pub fn hydrate_map(&self, mut root: Map<String, Value>) -> Result<PerspectiveDocument> {
        let ts = self.timestamp_ms;

        fill(&mut root, "id", || json!(Uuid::new_v4().to_string()));
        fill(&mut root, "name", || json!(DEFAULT_PERSPECTIVE_NAME));
        fill(&mut root, "version", || json!(BLOOM_VERSION));
        fill(&mut root, "type", || json!(STANDARD_PERSPECTIVE));
        fill(&mut root, "createdAt", || json!(ts));
        fill(&mut root, "lastEditedAt", || json!(ts));
        fill(&mut root, "hideUncategorisedData", || json!(false));
        fill(&mut root, "maxLimitToastMsgEnabled", || json!(false));
        root.entry("parentPerspectiveId").or_insert(Value::Null);
        fill(&mut root, "palette", || {
            serde_json::to_value(Palette::default()).unwrap_or(Value::Null)
        });
        fill(&mut root, "sceneActions", || json!([]));

        let mut labels = self.hydrate_root_labels(&mut root)?;

        let categories = take_array(&mut root, "categories", "categories")?
            .into_iter()
            .enumerate()
            .map(|(idx, category)| self.hydrate_category(idx, category, &mut labels))
            .collect::<Result<Vec<_>>>()?;
        root.insert("categories".to_string(), Value::Array(categories));

        let relationships = take_array(&mut root, "relationshipTypes", "relationshipTypes")?
            .into_iter()
            .enumerate()
            .map(|(idx, rel)| Self::hydrate_relationship(idx, rel))
            .collect::<Result<Vec<_>>>()?;

        let templates = take_array(&mut root, "templates", "templates")?
            .into_iter()
            .enumerate()
            .map(|(idx, template)| self.hydrate_template(idx, template))
            .collect::<Result<Vec<_>>>()?;
        root.insert("templates".to_string(), Value::Array(templates));

        if root.get("hiddenRelationshipTypes").map_or(true, Value::is_null) {
            let used: BTreeSet<&str> = relationships
                .iter()
                .filter_map(|r| r.get("name").and_then(Value::as_str))
                .collect();
            let hidden: Vec<Value> = self
                .known_relationship_types
                .iter()
                .filter(|t| !used.contains(t.as_str()))
                .map(|t| json!(t))
                .collect();
            root.insert("hiddenRelationshipTypes".to_string(), Value::Array(hidden));
        }
        root.insert("relationshipTypes".to_string(), Value::Array(relationships));

        let mut metadata = match root.remove("metadata") {
            None | Some(Value::Null) => Map::new(),
            Some(value) => into_object(value, "metadata")?,
        };
        fill(&mut metadata, "pathSegments", || json!([]));
        fill(&mut metadata, "indexes", || json!([]));
        root.insert("metadata".to_string(), Value::Object(metadata));

        root.insert("labels".to_string(), Value::Object(labels));

        let document: PerspectiveDocument = serde_json::from_value(Value::Object(root))
            .map_err(|e| BloomError::violation("$", e.to_string()))?;

        if let Some((field, label)) = document.undeclared_labels().into_iter().next() {
            return Err(BloomError::violation(
                field,
                format!("label '{}' is not declared in root-level labels", label),
            ));
        }

        debug!(
            "Hydrated perspective '{}': {} categories, {} relationship types, {} templates",
            document.name,
            document.categories.len(),
            document.relationship_types.len(),
            document.templates.len()
        );

        Ok(document)
    }

    /// Root `labels`: backtick-free keys, property entries as objects
    fn hydrate_root_labels(&self, root: &mut Map<String, Value>) -> Result<Map<String, Value>> {
        let raw = match root.remove("labels") {
            None | Some(Value::Null) => Map::new(),
            Some(value) => into_object(value, "labels")?,
        };

        let mut labels = Map::new();
        for (key, props) in raw {
            let label = key.replace('`', "");
            let field = format!("labels.{}", label);
            let props = match props {
                Value::Null => Vec::new(),
                Value::Array(items) => items,
                _ => return Err(BloomError::violation(field, "expected a JSON array")),
            };

            let props = props
                .into_iter()
                .map(|prop| {
                    let mut prop = match prop {
                        Value::String(name) => {
                            let mut map = Map::new();
                            map.insert("propertyKey".to_string(), json!(name));
                            map
                        }
                        other => into_object(other, &field)?,
                    };
                    rename(&mut prop, "name", "propertyKey");
                    fill(&mut prop, "type", || json!(label));
                    fill(&mut prop, "dataType", || json!("string"));
                    Ok(Value::Object(prop))
                })
                .collect::<Result<Vec<_>>>()?;

            labels.insert(label, Value::Array(props));
        }

        Ok(labels)
    }

    fn hydrate_category(
        &self,
        idx: usize,
        category: Value,
        labels: &mut Map<String, Value>,
    ) -> Result<Value> {
        let field = format!("categories[{}]", idx);
        let mut category = into_object(category, &field)?;
        let ts = self.timestamp_ms;

        rename(&mut category, "label", "labels");
        let category_labels: Vec<String> = match category.remove("labels") {
            Some(Value::String(label)) => vec![label.replace('`', "")],
            Some(Value::Array(items)) => items.iter().filter_map(clean_label).collect(),
            _ => Vec::new(),
        };
        let Some(primary) = category_labels.first().cloned() else {
            return Err(BloomError::violation(
                format!("{}.labels", field),
                "category declares no label",
            ));
        };
        category.insert("labels".to_string(), json!(category_labels));

        fill(&mut category, "id", || json!(idx + 1));
        fill(&mut category, "name", || json!(primary));
        fill(&mut category, "createdAt", || json!(ts));
        fill(&mut category, "lastEditedAt", || json!(ts));
        fill(&mut category, "color", || json!(DEFAULT_CATEGORY_COLOR));
        fill(&mut category, "icon", || json!(NO_ICON));
        fill(&mut category, "size", || json!(1));
        fill(&mut category, "textSize", || json!(1));
        fill(&mut category, "textAlign", || json!(DEFAULT_TEXT_ALIGN));
        fill(&mut category, "captionKeys", || json!([]));
        fill(&mut category, "styleRules", || json!([]));

        let properties = take_array(&mut category, "properties", &format!("{}.properties", field))?
            .into_iter()
            .map(|prop| {
                let mut prop = match prop {
                    Value::String(name) => {
                        let mut map = Map::new();
                        map.insert("name".to_string(), json!(name));
                        map
                    }
                    other => into_object(other, &format!("{}.properties", field))?,
                };
                fill(&mut prop, "exclude", || json!(false));
                fill(&mut prop, "dataType", || json!("string"));
                Ok(Value::Object(prop))
            })
            .collect::<Result<Vec<_>>>()?;

        let first_property = properties
            .first()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        match category.get_mut("captions") {
            Some(Value::Array(captions)) if !captions.is_empty() => {
                for caption in captions.iter_mut() {
                    if let Value::Object(caption) = caption {
                        fill(caption, "styles", || json!([]));
                        fill(caption, "isCaption", || json!(true));
                        fill(caption, "inTooltip", || json!(true));
                        if caption.get("type").and_then(Value::as_str) == Some("property") {
                            fill(caption, "isGdsData", || json!(false));
                        }
                    }
                }
            }
            _ => {
                let caption = match &first_property {
                    Some(key) => Caption::property(key.clone()),
                    None => Caption::label(primary.clone()),
                };
                category.insert("captions".to_string(), json!([caption_value(caption)]));
            }
        }

        // A category's labels are declared labels of the perspective
        for label in &category_labels {
            if !labels.contains_key(label) {
                let label_props: Vec<Value> = properties
                    .iter()
                    .map(|p| {
                        json!({
                            "propertyKey": p.get("name").cloned().unwrap_or(Value::Null),
                            "type": label,
                            "dataType": p.get("dataType").cloned().unwrap_or(json!("string")),
                        })
                    })
                    .collect();
                labels.insert(label.clone(), Value::Array(label_props));
            }
        }

        category.insert("properties".to_string(), Value::Array(properties));
        Ok(Value::Object(category))
    }

    fn hydrate_relationship(idx: usize, rel: Value) -> Result<Value> {
        let field = format!("relationshipTypes[{}]", idx);
        let mut rel = match rel {
            Value::String(name) => {
                let mut map = Map::new();
                map.insert("name".to_string(), json!(name));
                map
            }
            other => into_object(other, &field)?,
        };

        if rel.get("name").map_or(true, Value::is_null) {
            if let Some(rel_type) = rel.get("type").cloned() {
                rel.insert("name".to_string(), rel_type);
            }
        }
        let name = rel
            .get("name")
            .and_then(clean_label)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                BloomError::violation(format!("{}.name", field), "relationship type has no name")
            })?;
        rel.insert("name".to_string(), json!(name));

        for side in ["start", "end"] {
            if let Some(value) = rel.get(side) {
                match clean_label(value) {
                    Some(label) => {
                        rel.insert(side.to_string(), json!(label));
                    }
                    None => {
                        rel.remove(side);
                    }
                }
            }
        }

        fill(&mut rel, "id", || json!(name));
        fill(&mut rel, "color", || json!(DEFAULT_RELATIONSHIP_COLOR));
        fill(&mut rel, "properties", || json!([]));
        fill(&mut rel, "size", || json!(1));
        fill(&mut rel, "textSize", || json!(1));
        fill(&mut rel, "textAlign", || json!(DEFAULT_TEXT_ALIGN));
        fill(&mut rel, "captionKeys", || json!([]));
        fill(&mut rel, "styleRules", || json!([]));
        fill(&mut rel, "captions", || {
            json!([caption_value(Caption::relationship(name.clone()))])
        });

        let zero = rel
            .get("size")
            .and_then(Value::as_number)
            .and_then(Number::as_f64)
            .is_some_and(|size| size == 0.0);
        if zero {
            return Err(BloomError::violation(
                format!("{}.size", field),
                "relationship size must be non-zero",
            ));
        }

        Ok(Value::Object(rel))
    }

    fn hydrate_template(&self, idx: usize, template: Value) -> Result<Value> {
        let field = format!("templates[{}]", idx);
        let mut template = into_object(template, &field)?;

        rename(&mut template, "query", "cypher");
        rename(&mut template, "description", "text");
        if template.get("cypher").map_or(true, Value::is_null) {
            return Err(BloomError::violation(
                format!("{}.cypher", field),
                "search phrase has no Cypher query",
            ));
        }

        let fallback_text = template
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Search Phrase")
            .to_string();
        fill(&mut template, "text", || json!(fallback_text));
        fill(&mut template, "id", || {
            json!(format!("tmpl:{}", self.timestamp_ms + idx as i64))
        });
        fill(&mut template, "createdAt", || json!(self.timestamp_ms));
        template.entry("isUpdateQuery").or_insert(Value::Null);
        template
            .entry("isWriteTransactionChecked")
            .or_insert(Value::Null);
        fill(&mut template, "hasCypherErrors", || json!(false));

        let params = take_array(&mut template, "params", &format!("{}.params", field))?
            .into_iter()
            .map(|param| {
                let mut param = into_object(param, &format!("{}.params", field))?;
                fill(&mut param, "collapsed", || json!(false));
                fill(&mut param, "suggestionBoolean", || json!(false));
                param.entry("cypher").or_insert(Value::Null);
                if let Some(label) = param.get("suggestionLabel").and_then(clean_label) {
                    param.insert("suggestionLabel".to_string(), json!(label));
                }
                Ok(Value::Object(param))
            })
            .collect::<Result<Vec<_>>>()?;
        template.insert("params".to_string(), Value::Array(params));

        Ok(Value::Object(template))
    }
}
