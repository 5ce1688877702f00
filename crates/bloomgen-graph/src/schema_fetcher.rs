use async_trait::async_trait;
use bloomgen_core::{
    BloomError, Neo4jCredentials, Result, SchemaDescriptor, SchemaSnapshot, SchemaSource,
    SchemaVariant,
};
use neo4rs::{query, ConfigBuilder, Graph, Row};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::assembly::{NodeTypePropertyRow, PatternRow, SchemaAssembler};

pub const CONNECTIVITY_QUERY: &str = "RETURN 1 AS ok";
pub const LABELS_QUERY: &str = "CALL db.labels() YIELD label RETURN label";
pub const NODE_TYPE_PROPERTIES_QUERY: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeType, propertyName, propertyTypes \
     RETURN nodeType, propertyName, propertyTypes";
pub const RELATIONSHIP_TYPES_QUERY: &str =
    "CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType";
pub const PATTERNS_QUERY: &str = "MATCH (a)-[r]->(b) \
     RETURN DISTINCT labels(a) AS start_labels, type(r) AS rel_type, labels(b) AS end_labels";
pub const CONSTRAINTS_QUERY: &str =
    "SHOW CONSTRAINTS YIELD name, type, entityType, labelsOrTypes, properties";
pub const INDEXES_QUERY: &str =
    "SHOW INDEXES YIELD name, type, entityType, labelsOrTypes, properties";

/// Live schema source backed by a Neo4j database.
///
/// Every call opens its own connection pool, verifies connectivity and then
/// issues read-only catalog queries. Nothing is retried.
pub struct Neo4jSchemaFetcher {
    credentials: Neo4jCredentials,
}

impl Neo4jSchemaFetcher {
    pub fn new(credentials: Neo4jCredentials) -> Self {
        Self { credentials }
    }

    async fn connect(&self) -> Result<Graph> {
        let creds = &self.credentials;
        info!("Connecting to Neo4j at {}", creds.uri);

        let mut builder = ConfigBuilder::default()
            .uri(creds.uri.as_str())
            .user(creds.username.as_str())
            .password(creds.password.expose_secret());
        if let Some(database) = &creds.database {
            builder = builder.db(database.as_str());
        }
        let config = builder.build().map_err(|e| {
            BloomError::Connection(format!("Invalid connection settings for {}: {}", creds.uri, e))
        })?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| BloomError::Connection(format!("Failed to connect to {}: {}", creds.uri, e)))?;

        let unreachable = |e: neo4rs::Error| {
            BloomError::Connection(format!("Connectivity check against {} failed: {}", creds.uri, e))
        };
        let mut probe = graph
            .execute(query(CONNECTIVITY_QUERY))
            .await
            .map_err(unreachable)?;
        probe.next().await.map_err(unreachable)?;

        info!("Connection established");
        Ok(graph)
    }

    async fn fetch_rows(&self, graph: &Graph, cypher: &'static str) -> Result<Vec<Row>> {
        debug!("Running schema query: {}", cypher);
        let mut stream = graph
            .execute(query(cypher))
            .await
            .map_err(|e| BloomError::query(cypher, e))?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| BloomError::query(cypher, e))? {
            rows.push(row);
        }
        debug!("{} rows", rows.len());
        Ok(rows)
    }

    async fn fetch_descriptors(
        &self,
        graph: &Graph,
        cypher: &'static str,
    ) -> Result<Vec<SchemaDescriptor>> {
        let rows = self.fetch_rows(graph, cypher).await?;
        rows.iter()
            .map(|row| {
                Ok(SchemaDescriptor {
                    name: column(row, "name", cypher)?,
                    kind: column(row, "type", cypher)?,
                    entity_type: column(row, "entityType", cypher)?,
                    labels_or_types: column::<Option<Vec<String>>>(row, "labelsOrTypes", cypher)?
                        .unwrap_or_default(),
                    properties: column::<Option<Vec<String>>>(row, "properties", cypher)?
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}

fn column<T: DeserializeOwned>(row: &Row, key: &str, cypher: &str) -> Result<T> {
    row.get::<T>(key)
        .map_err(|e| BloomError::query(cypher, format!("unexpected value in column {}: {}", key, e)))
}

#[async_trait]
impl SchemaSource for Neo4jSchemaFetcher {
    async fn fetch_schema(&self, variant: SchemaVariant) -> Result<SchemaSnapshot> {
        let graph = self.connect().await?;
        let mut assembler = SchemaAssembler::new(variant);

        let labels = self
            .fetch_rows(&graph, LABELS_QUERY)
            .await?
            .iter()
            .map(|row| column::<String>(row, "label", LABELS_QUERY))
            .collect::<Result<Vec<_>>>()?;
        assembler.add_labels(labels);

        for row in self.fetch_rows(&graph, NODE_TYPE_PROPERTIES_QUERY).await? {
            assembler.add_node_type_property(NodeTypePropertyRow {
                node_type: column(&row, "nodeType", NODE_TYPE_PROPERTIES_QUERY)?,
                property_name: column(&row, "propertyName", NODE_TYPE_PROPERTIES_QUERY)?,
                property_types: column::<Option<Vec<String>>>(
                    &row,
                    "propertyTypes",
                    NODE_TYPE_PROPERTIES_QUERY,
                )?
                .unwrap_or_default(),
            });
        }

        let rel_types = self
            .fetch_rows(&graph, RELATIONSHIP_TYPES_QUERY)
            .await?
            .iter()
            .map(|row| column::<String>(row, "relationshipType", RELATIONSHIP_TYPES_QUERY))
            .collect::<Result<Vec<_>>>()?;
        assembler.add_relationship_types(rel_types);

        for row in self.fetch_rows(&graph, PATTERNS_QUERY).await? {
            assembler.add_pattern(PatternRow {
                start_labels: column(&row, "start_labels", PATTERNS_QUERY)?,
                rel_type: column(&row, "rel_type", PATTERNS_QUERY)?,
                end_labels: column(&row, "end_labels", PATTERNS_QUERY)?,
            });
        }

        if variant == SchemaVariant::Full {
            for descriptor in self.fetch_descriptors(&graph, CONSTRAINTS_QUERY).await? {
                assembler.add_constraint(descriptor);
            }
            for descriptor in self.fetch_descriptors(&graph, INDEXES_QUERY).await? {
                assembler.add_index(descriptor);
            }
        }

        let snapshot = assembler.finish();
        info!(
            "Fetched {} schema: {} labels, {} relationship types, {} patterns",
            variant,
            snapshot.labels.len(),
            snapshot.relationship_types.len(),
            snapshot.relationships.len()
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        self.credentials.uri.clone()
    }
}
