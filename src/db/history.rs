

use async_trait::async_trait;
use neo4rs::{query, BoltNull, BoltType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info};

use super::client::Neo4jClient;
use crate::core::error::{MovieAgentError, Result};

const SAVE_HISTORY_QUERY: &str = r#"
MERGE (session:Session {id: $sessionId})
CREATE (response:Response {
  id: randomUuid(),
  createdAt: datetime(),
  source: $source,
  input: $input,
  output: $output,
  rephrasedQuestion: $rephrasedQuestion,
  cypher: $cypher
})
CREATE (session)-[:HAS_RESPONSE]->(response)
WITH session, response
CALL {
  WITH session, response
  MATCH (session)-[lr:LAST_RESPONSE]->(lastResponse)
  CREATE (lastResponse)-[:NEXT]->(response)
  DELETE lr
}
CREATE (session)-[:LAST_RESPONSE]->(response)
WITH response
CALL {
  WITH response
  UNWIND $ids AS contextId
  MATCH (context) WHERE elementId(context) = contextId
  CREATE (response)-[:CONTEXT]->(context)
  RETURN count(*) AS contextCount
}
RETURN DISTINCT response.id AS id
"#;

/// Which pipeline produced a persisted turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResponseSource {
    Vector,
    Cypher,
}

/// One conversation turn to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub session_id: String,
    pub source: ResponseSource,
    pub input: String,
    pub rephrased_question: String,
    pub output: String,
    /// Element ids of the nodes the answer was grounded on, in retrieval order.
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cypher: Option<String>,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: String,
    pub input: String,
    pub output: String,
}


#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persists one turn and returns the stored response id.
    async fn save_history(&self, entry: &HistoryEntry) -> Result<String>;

    /// The last `limit` turns of a session, oldest first.
    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>>;
}

#[async_trait]
impl<T: HistoryStore + ?Sized> HistoryStore for Arc<T> {
    async fn save_history(&self, entry: &HistoryEntry) -> Result<String> {
        (**self).save_history(entry).await
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        (**self).get_history(session_id, limit).await
    }
}

/// Variable-length bounds cannot be parameters, so the hop count is inlined.
fn history_query(limit: usize) -> String {
    let hops = limit.saturating_sub(1);
    format!(
        r#"
MATCH (:Session {{id: $sessionId}})-[:LAST_RESPONSE]->(last)
MATCH path = (start)-[:NEXT*0..{hops}]->(last)
WHERE length(path) = {hops} OR NOT EXISTS {{ ()-[:NEXT]->(start) }}
WITH path ORDER BY length(path) DESC LIMIT 1
UNWIND nodes(path) AS response
RETURN response.id AS id, response.input AS input, response.output AS output
"#
    )
}


pub struct Neo4jHistoryStore {
    client: Neo4jClient,
}

impl Neo4jHistoryStore {

    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HistoryStore for Neo4jHistoryStore {
    async fn save_history(&self, entry: &HistoryEntry) -> Result<String> {
        let cypher = match &entry.cypher {
            Some(statement) => BoltType::from(statement.clone()),
            None => BoltType::Null(BoltNull),
        };
        let source: &'static str = entry.source.into();

        let ids: Vec<String> = self
            .client
            .fetch_column(
                query(SAVE_HISTORY_QUERY)
                    .param("sessionId", entry.session_id.clone())
                    .param("source", source)
                    .param("input", entry.input.clone())
                    .param("output", entry.output.clone())
                    .param("rephrasedQuestion", entry.rephrased_question.clone())
                    .param("cypher", cypher)
                    .param("ids", entry.ids.clone()),
                "id",
            )
            .await?;

        let response_id = ids.into_iter().next().ok_or_else(|| {
            MovieAgentError::History(format!(
                "no response id returned for session {}",
                entry.session_id
            ))
        })?;

        info!(
            "Saved {} response {} for session {} ({} context nodes)",
            entry.source,
            response_id,
            entry.session_id,
            entry.ids.len()
        );
        Ok(response_id)
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let turns: Vec<ChatTurn> = self
            .client
            .fetch_rows(query(&history_query(limit)).param("sessionId", session_id))
            .await?;

        debug!("Loaded {} turns for session {}", turns.len(), session_id);
        Ok(turns)
    }
}
