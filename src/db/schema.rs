

use async_trait::async_trait;
use neo4rs::query;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::client::Neo4jClient;
use crate::core::error::Result;

const NODE_PROPERTIES_QUERY: &str = r#"
CALL apoc.meta.data()
YIELD label, other, elementType, type, property
WHERE NOT type = "RELATIONSHIP" AND elementType = "node"
WITH label AS nodeLabels, collect({property: property, type: type}) AS properties
RETURN {labels: nodeLabels, properties: properties} AS output
"#;

const REL_PROPERTIES_QUERY: &str = r#"
CALL apoc.meta.data()
YIELD label, other, elementType, type, property
WHERE NOT type = "RELATIONSHIP" AND elementType = "relationship"
WITH label AS relType, collect({property: property, type: type}) AS properties
RETURN {type: relType, properties: properties} AS output
"#;

const RELATIONSHIPS_QUERY: &str = r#"
CALL apoc.meta.data()
YIELD label, other, elementType, type, property
WHERE type = "RELATIONSHIP" AND elementType = "node"
UNWIND other AS otherNode
RETURN {start: label, type: property, end: toString(otherNode)} AS output
"#;

/// The graph database as the pipelines see it.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Current schema description. Implementations must not cache it.
    async fn schema(&self) -> Result<String>;

    /// Executes a read statement and returns each row as a JSON object.
    async fn query(&self, cypher: &str) -> Result<Vec<Value>>;
}

#[async_trait]
impl<T: GraphStore + ?Sized> GraphStore for Arc<T> {
    async fn schema(&self) -> Result<String> {
        (**self).schema().await
    }

    async fn query(&self, cypher: &str) -> Result<Vec<Value>> {
        (**self).query(cypher).await
    }
}


#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropertySchema {
    pub property: String,
    #[serde(rename = "type")]
    pub kind: String,
}


#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeSchema {
    pub labels: String,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
}


#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationshipPropertySchema {
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
}


#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationshipSchema {
    pub start: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub end: String,
}

fn format_properties(properties: &[PropertySchema]) -> String {
    properties
        .iter()
        .map(|p| format!("{}: {}", p.property, p.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders introspected schema parts into the text handed to the model.
pub fn format_schema(
    nodes: &[NodeSchema],
    relationship_properties: &[RelationshipPropertySchema],
    relationships: &[RelationshipSchema],
) -> String {
    let mut lines = vec!["Node properties are the following:".to_string()];
    lines.extend(
        nodes
            .iter()
            .map(|n| format!("{} {{{}}}", n.labels, format_properties(&n.properties))),
    );

    lines.push("Relationship properties are the following:".to_string());
    lines.extend(
        relationship_properties
            .iter()
            .map(|r| format!("{} {{{}}}", r.rel_type, format_properties(&r.properties))),
    );

    lines.push("The relationships are the following:".to_string());
    lines.extend(
        relationships
            .iter()
            .map(|r| format!("(:{})-[:{}]->(:{})", r.start, r.rel_type, r.end)),
    );

    lines.join("\n")
}

#[async_trait]
impl GraphStore for Neo4jClient {
    async fn schema(&self) -> Result<String> {
        let nodes: Vec<NodeSchema> = self
            .fetch_column(query(NODE_PROPERTIES_QUERY), "output")
            .await?;
        let relationship_properties: Vec<RelationshipPropertySchema> = self
            .fetch_column(query(REL_PROPERTIES_QUERY), "output")
            .await?;
        let relationships: Vec<RelationshipSchema> = self
            .fetch_column(query(RELATIONSHIPS_QUERY), "output")
            .await?;

        debug!(
            "Schema introspected: {} labels, {} relationship types, {} patterns",
            nodes.len(),
            relationship_properties.len(),
            relationships.len()
        );

        Ok(format_schema(&nodes, &relationship_properties, &relationships))
    }

    async fn query(&self, cypher: &str) -> Result<Vec<Value>> {
        debug!("Executing Cypher: {}", crate::utils::single_line(cypher));
        Ok(self.fetch_rows::<Value>(query(cypher)).await?)
    }
}
