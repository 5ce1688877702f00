// ABOUTME: Graph schema snapshot shared by both perspective generators
// ABOUTME: Owns the on-disk cache format and the cache-first loading policy

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;

/// Which catalog queries produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// Labels, properties and relationship types
    #[default]
    Simple,
    /// Simple plus constraints and indexes
    Full,
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVariant::Simple => write!(f, "simple"),
            SchemaVariant::Full => write!(f, "full"),
        }
    }
}

/// A property observed on a label, with the first Neo4j type reported for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    #[serde(rename = "type")]
    pub neo4j_type: String,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, neo4j_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            neo4j_type: neo4j_type.into(),
        }
    }

    /// Bloom's data type name for this property
    pub fn bloom_data_type(&self) -> String {
        bloom_data_type(&self.neo4j_type)
    }
}

/// A `(start)-[type]->(end)` label pattern present in the data
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub start: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub end: String,
}

impl RelationshipPattern {
    pub fn new(start: impl Into<String>, rel_type: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            rel_type: rel_type.into(),
            end: end.into(),
        }
    }
}

/// Constraint or index metadata from `SHOW CONSTRAINTS` / `SHOW INDEXES`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub labels_or_types: Vec<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

/// Cached description of a graph database's schema
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub variant: SchemaVariant,
    /// Label name to the properties observed on it
    pub labels: BTreeMap<String, Vec<PropertySpec>>,
    pub relationship_types: BTreeSet<String>,
    #[serde(default)]
    pub relationships: Vec<RelationshipPattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<SchemaDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<SchemaDescriptor>,
}

impl SchemaSnapshot {
    pub fn label_names(&self) -> BTreeSet<String> {
        self.labels.keys().cloned().collect()
    }

    /// Relationship types from the catalog and from observed patterns
    pub fn relationship_type_names(&self) -> BTreeSet<String> {
        let mut names = self.relationship_types.clone();
        names.extend(self.relationships.iter().map(|r| r.rel_type.clone()));
        names
    }

    pub fn properties(&self, label: &str) -> &[PropertySpec] {
        self.labels.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Read a snapshot from a cache file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the snapshot as pretty JSON, replacing any previous cache
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        crate::writer::write_atomically(path, json.as_bytes())
    }
}

/// Map a Neo4j property type to the name Bloom uses
pub fn bloom_data_type(neo4j_type: &str) -> String {
    match neo4j_type {
        "String" | "StringArray" => "string".to_string(),
        "Integer" | "Long" | "IntegerArray" | "LongArray" => "bigint".to_string(),
        "Float" | "Double" | "FloatArray" | "DoubleArray" => "number".to_string(),
        "Boolean" | "BooleanArray" => "boolean".to_string(),
        other => other.to_lowercase(),
    }
}

/// Anything able to produce a live schema snapshot
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_schema(&self, variant: SchemaVariant) -> Result<SchemaSnapshot>;

    /// Human readable location for log lines
    fn describe(&self) -> String;
}

/// Cache files for both snapshot variants
#[derive(Debug, Clone)]
pub struct SchemaCache {
    simple_path: PathBuf,
    full_path: PathBuf,
}

impl SchemaCache {
    pub fn new(simple_path: impl Into<PathBuf>, full_path: impl Into<PathBuf>) -> Self {
        Self {
            simple_path: simple_path.into(),
            full_path: full_path.into(),
        }
    }

    pub fn path(&self, variant: SchemaVariant) -> &Path {
        match variant {
            SchemaVariant::Simple => &self.simple_path,
            SchemaVariant::Full => &self.full_path,
        }
    }

    /// Cached snapshot if present and readable
    pub fn read(&self, variant: SchemaVariant) -> Option<SchemaSnapshot> {
        let path = self.path(variant);
        if !path.exists() {
            return None;
        }
        match SchemaSnapshot::load(path) {
            Ok(snapshot) => {
                info!("Loading {} schema from cache: {}", variant, path.display());
                Some(snapshot)
            }
            Err(e) => {
                warn!(
                    "Failed to load schema cache {}: {}. Fetching live...",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Return the cached snapshot when allowed, otherwise fetch and overwrite the cache.
    /// The cache is only written after the fetch succeeded.
    pub async fn load_or_fetch(
        &self,
        source: &dyn SchemaSource,
        variant: SchemaVariant,
        use_cache: bool,
    ) -> Result<SchemaSnapshot> {
        if use_cache {
            if let Some(snapshot) = self.read(variant) {
                return Ok(snapshot);
            }
        }

        info!("Fetching {} schema from {}", variant, source.describe());
        let snapshot = source.fetch_schema(variant).await?;

        let path = self.path(variant);
        snapshot.save(path)?;
        info!("Schema saved to cache: {}", path.display());

        Ok(snapshot)
    }
}
