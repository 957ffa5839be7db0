

use async_trait::async_trait;
use neo4rs::query;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::client::Neo4jClient;
use crate::core::error::Result;
use crate::llm::embeddings::EmbeddingGenerator;

const VECTOR_SEARCH_QUERY: &str = r#"
CALL db.index.vector.queryNodes($index, $k, $embedding)
YIELD node, score
RETURN
  node.plot AS text,
  score,
  {
    _id: elementId(node),
    title: node.title,
    directors: [ (person)-[:DIRECTED]->(node) | person.name ],
    actors: [ (person)-[r:ACTED_IN]->(node) | [person.name, r.role] ],
    tmdbId: node.tmdbId,
    source: 'https://www.themoviedb.org/movie/' + node.tmdbId
  } AS metadata
ORDER BY score DESC
"#;

/// One retrieved unit: the embedded text plus everything known about its node.
///
/// Serializes as `{"pageContent": ..., "metadata": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {

    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }


    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Element id of the source node, when present and a string.
    pub fn id(&self) -> Option<&str> {
        self.metadata.get("_id").and_then(Value::as_str)
    }
}

/// Nearest-neighbour search over the plot index.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` documents, most similar first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

#[async_trait]
impl<T: Retriever + ?Sized> Retriever for Arc<T> {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        (**self).retrieve(query, k).await
    }
}

#[derive(Debug, Deserialize)]
struct VectorHit {
    #[serde(default)]
    text: Option<String>,
    score: f64,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl From<VectorHit> for Document {
    fn from(hit: VectorHit) -> Self {
        let mut document = Document {
            page_content: hit.text.unwrap_or_default(),
            metadata: hit.metadata,
        };
        document.metadata.insert("score".to_string(), Value::from(hit.score));
        document
    }
}


pub struct Neo4jVectorRetriever {
    client: Neo4jClient,
    embeddings: Arc<EmbeddingGenerator>,
    index: String,
}

impl Neo4jVectorRetriever {

    pub fn new(client: Neo4jClient, embeddings: Arc<EmbeddingGenerator>, index: impl Into<String>) -> Self {
        let index = index.into();
        info!("Neo4jVectorRetriever using index '{}'", index);
        Self {
            client,
            embeddings,
            index,
        }
    }
}

#[async_trait]
impl Retriever for Neo4jVectorRetriever {
    async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<Document>> {
        let embedding: Vec<f64> = self
            .embeddings
            .generate(text)
            .await?
            .into_iter()
            .map(f64::from)
            .collect();

        let hits: Vec<VectorHit> = self
            .client
            .fetch_rows(
                query(VECTOR_SEARCH_QUERY)
                    .param("index", self.index.clone())
                    .param("k", k as i64)
                    .param("embedding", embedding),
            )
            .await?;

        let documents: Vec<Document> = hits.into_iter().take(k).map(Document::from).collect();
        debug!(
            "Vector search '{}': {} documents",
            crate::safe_truncate_ellipsis(text, 40),
            documents.len()
        );
        Ok(documents)
    }
}
