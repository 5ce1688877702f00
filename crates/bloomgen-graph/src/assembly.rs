// ABOUTME: Turns raw catalog query rows into a SchemaSnapshot
// ABOUTME: Kept free of driver types so the merge rules are testable without a database

use bloomgen_core::{
    PropertySpec, RelationshipPattern, SchemaDescriptor, SchemaSnapshot, SchemaVariant,
};

/// Property type used when the catalog reports none
pub const FALLBACK_PROPERTY_TYPE: &str = "String";

/// One row of `db.schema.nodeTypeProperties()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypePropertyRow {
    pub node_type: String,
    pub property_name: Option<String>,
    pub property_types: Vec<String>,
}

/// One row of the distinct `(a)-[r]->(b)` pattern query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRow {
    pub start_labels: Vec<String>,
    pub rel_type: String,
    pub end_labels: Vec<String>,
}

/// Split a node type such as ``:`Order`:`Item` `` into its labels
pub fn split_node_type(node_type: &str) -> Vec<String> {
    node_type
        .split(':')
        .map(|part| part.trim().trim_matches('`').trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accumulates query results; order of insertion is preserved for patterns
#[derive(Debug, Default)]
pub struct SchemaAssembler {
    snapshot: SchemaSnapshot,
}

impl SchemaAssembler {
    pub fn new(variant: SchemaVariant) -> Self {
        Self {
            snapshot: SchemaSnapshot {
                variant,
                ..Default::default()
            },
        }
    }

    /// Register labels reported by `db.labels()`, even those without properties
    pub fn add_labels<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for label in labels {
            let label = label.as_ref().trim_matches('`');
            if !label.is_empty() {
                self.snapshot.labels.entry(label.to_string()).or_default();
            }
        }
    }

    pub fn add_node_type_property(&mut self, row: NodeTypePropertyRow) {
        let labels = split_node_type(&row.node_type);
        let property_type = row
            .property_types
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_PROPERTY_TYPE.to_string());

        for label in labels {
            let properties = self.snapshot.labels.entry(label).or_default();
            let Some(name) = row.property_name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            if !properties.iter().any(|p| p.name == name) {
                properties.push(PropertySpec::new(name, property_type.clone()));
            }
        }
    }

    pub fn add_relationship_types<I, S>(&mut self, rel_types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snapshot
            .relationship_types
            .extend(rel_types.into_iter().map(Into::into));
    }

    /// Expand a pattern row over every start/end label combination
    pub fn add_pattern(&mut self, row: PatternRow) {
        self.snapshot.relationship_types.insert(row.rel_type.clone());
        for start in &row.start_labels {
            for end in &row.end_labels {
                let pattern = RelationshipPattern::new(start, &row.rel_type, end);
                if !self.snapshot.relationships.contains(&pattern) {
                    self.snapshot.relationships.push(pattern);
                }
            }
        }
    }

    pub fn add_constraint(&mut self, descriptor: SchemaDescriptor) {
        self.snapshot.constraints.push(descriptor);
    }

    pub fn add_index(&mut self, descriptor: SchemaDescriptor) {
        self.snapshot.indexes.push(descriptor);
    }

    pub fn finish(self) -> SchemaSnapshot {
        self.snapshot
    }
}
