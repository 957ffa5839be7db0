//! Answers a conversation turn by generating Cypher, running it against the
//! movie graph and summarising the rows.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::answer_generation::AnswerGenerator;
use super::cypher_generation::CypherGenerationChain;
use super::cypher_guard::CypherGuard;
use super::vector_retrieval::AgentToolInput;
use crate::core::error::Result;
use crate::db::history::{HistoryEntry, HistoryStore, ResponseSource};
use crate::db::schema::GraphStore;

/// Everything the graph pipeline produced for one turn.
#[derive(Debug, Clone)]
pub struct CypherRecord {
    pub turn: AgentToolInput,
    /// The statement that was executed, after the guard rewrote it.
    pub cypher: String,
    pub rows: Vec<Value>,
    pub ids: Vec<String>,
    pub context: String,
    pub output: String,
    pub response_id: String,
}

/// String `_id` values of the rows, in row order. Rows without one are skipped.
pub fn extract_row_ids(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get("_id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}


pub struct CypherRetrievalChain {
    generator: CypherGenerationChain,
    guard: CypherGuard,
    graph: Arc<dyn GraphStore>,
    answerer: Arc<dyn AnswerGenerator>,
    history: Arc<dyn HistoryStore>,
}

impl CypherRetrievalChain {

    pub fn new(
        generator: CypherGenerationChain,
        guard: CypherGuard,
        graph: Arc<dyn GraphStore>,
        answerer: Arc<dyn AnswerGenerator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            generator,
            guard,
            graph,
            answerer,
            history,
        }
    }

    /// Generates a statement for the question and returns it only if it may be executed.
    pub async fn safe_cypher(&self, question: &str) -> Result<String> {
        let generated = self.generator.invoke(question).await?;
        self.guard.check(&generated).map_err(|e| {
            warn!(
                "Rejected generated Cypher ({}): {}",
                e,
                crate::safe_truncate_ellipsis(&crate::utils::single_line(&generated), 120)
            );
            e.into()
        })
    }


    pub async fn run(&self, turn: AgentToolInput) -> Result<CypherRecord> {
        let cypher = self.safe_cypher(&turn.rephrased_question).await?;

        let rows = self.graph.query(&cypher).await?;
        let ids = extract_row_ids(&rows);
        let context = serde_json::to_string(&rows)?;
        debug!("Cypher returned {} rows ({} with _id)", rows.len(), ids.len());

        let output = self
            .answerer
            .generate_answer(&turn.rephrased_question, &context)
            .await?;

        let entry = HistoryEntry {
            session_id: turn.session_id.clone(),
            source: ResponseSource::Cypher,
            input: turn.input.clone(),
            rephrased_question: turn.rephrased_question.clone(),
            output: output.clone(),
            ids: ids.clone(),
            cypher: Some(cypher.clone()),
        };
        let response_id = self.history.save_history(&entry).await?;

        info!(
            "Graph answer saved as {} (session={}, rows={})",
            response_id,
            turn.session_id,
            rows.len()
        );
        Ok(CypherRecord {
            turn,
            cypher,
            rows,
            ids,
            context,
            output,
            response_id,
        })
    }


    pub async fn invoke(&self, turn: AgentToolInput) -> Result<String> {
        Ok(self.run(turn).await?.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::cypher_guard::UnsafeCypher;
    use crate::chains::testing::{FakeAnswerer, FakeGraph, FakeHistory, FakeLlm};
    use crate::MovieAgentError;
    use serde_json::json;

    const SCHEMA: &str = "Node properties are the following:\nMovie {title: STRING}";

    fn turn() -> AgentToolInput {
        AgentToolInput::new("session-7", "who was in it?", "Who acted in Toy Story?")
    }

    fn rows() -> Vec<Value> {
        vec![
            json!({"actor": "Tom Hanks", "role": "Woody", "_id": "4:p:1"}),
            json!({"actor": "Tim Allen", "role": "Buzz Lightyear", "_id": "4:p:2"}),
            json!({"actor": "Don Rickles", "role": "Mr. Potato Head"}),
        ]
    }

    struct Fixture {
        graph: Arc<FakeGraph>,
        answerer: Arc<FakeAnswerer>,
        history: Arc<FakeHistory>,
        chain: CypherRetrievalChain,
    }

    fn fixture(llm_reply: &str) -> Fixture {
        let graph = Arc::new(FakeGraph::new(SCHEMA, rows()));
        let answerer = Arc::new(FakeAnswerer::replying("Tom Hanks and Tim Allen."));
        let history = Arc::new(FakeHistory::new());
        let generator =
            CypherGenerationChain::new(graph.clone(), Arc::new(FakeLlm::replying(llm_reply))).unwrap();
        let chain = CypherRetrievalChain::new(
            generator,
            CypherGuard::new(10),
            graph.clone(),
            answerer.clone(),
            history.clone(),
        );
        Fixture {
            graph,
            answerer,
            history,
            chain,
        }
    }

    #[test]
    fn test_row_ids_skip_rows_without_string_id() {
        let mut rows = rows();
        rows.push(json!({"_id": 42}));
        assert_eq!(extract_row_ids(&rows), vec!["4:p:1", "4:p:2"]);
    }

    #[tokio::test]
    async fn test_guarded_statement_executed_and_saved() {
        let f = fixture(
            "```cypher\nMATCH (p:Person)-[r:ACTED_IN]->(m:Movie {title: 'Toy Story'})\n\
             RETURN p.name AS actor, r.role AS role, elementId(p) AS _id;\n```",
        );

        let record = f.chain.run(turn()).await.unwrap();

        let expected = "MATCH (p:Person)-[r:ACTED_IN]->(m:Movie {title: 'Toy Story'})\n\
                        RETURN p.name AS actor, r.role AS role, elementId(p) AS _id LIMIT 10";
        assert_eq!(record.cypher, expected);
        assert_eq!(f.graph.queries(), vec![expected.to_string()]);
        assert_eq!(record.output, "Tom Hanks and Tim Allen.");

        let calls = f.answerer.calls();
        assert_eq!(calls[0].0, "Who acted in Toy Story?");
        assert_eq!(calls[0].1, serde_json::to_string(&rows()).unwrap());

        let saved = f.history.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].source, ResponseSource::Cypher);
        assert_eq!(saved[0].ids, vec!["4:p:1", "4:p:2"]);
        assert_eq!(saved[0].cypher.as_deref(), Some(expected));
        assert_eq!(saved[0].input, "who was in it?");
    }

    #[tokio::test]
    async fn test_write_statement_never_reaches_the_graph() {
        let f = fixture("MATCH (m:Movie) DETACH DELETE m");

        let result = f.chain.invoke(turn()).await;

        assert!(matches!(
            result,
            Err(MovieAgentError::UnsafeCypher(UnsafeCypher::ForbiddenClause(_)))
        ));
        assert!(f.graph.queries().is_empty());
        assert!(f.answerer.calls().is_empty());
        assert!(f.history.saved().is_empty());
    }

    #[tokio::test]
    async fn test_empty_completion_is_rejected() {
        let f = fixture("");
        let result = f.chain.invoke(turn()).await;
        assert!(matches!(
            result,
            Err(MovieAgentError::UnsafeCypher(UnsafeCypher::Empty))
        ));
        assert!(f.history.saved().is_empty());
    }
}
