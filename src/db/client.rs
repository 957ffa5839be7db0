

use neo4rs::{ConfigBuilder, Graph, Query};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::MovieAgentConfig;


#[derive(Debug, Error)]
pub enum Neo4jClientError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Driver error: {0}")]
    Driver(#[from] neo4rs::Error),
    #[error("Row decoding failed: {0}")]
    Decode(#[from] neo4rs::DeError),
}

/// Shared Bolt connection pool. Cloning is cheap; every clone talks to the same pool.
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Arc<Graph>,
    uri: String,
    database: String,
}

impl Neo4jClient {

    pub async fn connect(
        uri: &str,
        username: &str,
        password: &str,
        database: &str,
    ) -> Result<Self, Neo4jClientError> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(username)
            .password(password)
            .db(database)
            .build()
            .map_err(|e| Neo4jClientError::Connection(e.to_string()))?;

        let graph = Graph::connect(config).await?;
        info!("Neo4jClient connected to {} (db={})", uri, database);

        Ok(Self {
            graph: Arc::new(graph),
            uri: uri.to_string(),
            database: database.to_string(),
        })
    }


    pub async fn from_config(config: &MovieAgentConfig) -> Result<Self, Neo4jClientError> {
        Self::connect(
            &config.neo4j_uri,
            &config.neo4j_username,
            &config.neo4j_password,
            &config.neo4j_database,
        )
        .await
    }

    /// Connection under the read-only login, when the config names one.
    pub async fn read_only_from_config(
        config: &MovieAgentConfig,
    ) -> Result<Option<Self>, Neo4jClientError> {
        let Some((username, password)) = config.read_credentials() else {
            return Ok(None);
        };
        let client =
            Self::connect(&config.neo4j_uri, username, password, &config.neo4j_database).await?;
        Ok(Some(client))
    }

    /// Runs a query and decodes every row as a whole into `T`.
    pub async fn fetch_rows<T>(&self, query: Query) -> Result<Vec<T>, Neo4jClientError>
    where
        T: DeserializeOwned,
    {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row.to::<T>()?);
        }
        debug!("Fetched {} rows", rows.len());
        Ok(rows)
    }

    /// Runs a query and decodes a single named column of every row.
    pub async fn fetch_column<T>(&self, query: Query, column: &str) -> Result<Vec<T>, Neo4jClientError>
    where
        T: DeserializeOwned,
    {
        let mut stream = self.graph.execute(query).await?;
        let mut values = Vec::new();
        while let Some(row) = stream.next().await? {
            values.push(row.get::<T>(column)?);
        }
        Ok(values)
    }


    pub fn uri(&self) -> &str {
        &self.uri
    }


    pub fn database(&self) -> &str {
        &self.database
    }
}
