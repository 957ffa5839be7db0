//! Answers a conversation turn from the plot documents nearest to the
//! rephrased question, and records the turn in the session history.
//!
//! Each step consumes the record produced by the previous one and returns a
//! wider record; nothing already attached is modified:
//!
//! `AgentToolInput` → [`WithDocuments`] → [`WithContext`] → [`WithOutput`] → [`RetrievalRecord`]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::answer_generation::AnswerGenerator;
use crate::core::error::{MovieAgentError, Result};
use crate::db::history::{HistoryEntry, HistoryStore, ResponseSource};
use crate::db::vector::{Document, Retriever};

/// A conversation turn whose question has already been made standalone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentToolInput {
    pub session_id: String,
    pub input: String,
    pub rephrased_question: String,
}

impl AgentToolInput {

    pub fn new(
        session_id: impl Into<String>,
        input: impl Into<String>,
        rephrased_question: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            input: input.into(),
            rephrased_question: rephrased_question.into(),
        }
    }
}


#[derive(Debug, Clone)]
pub struct WithDocuments {
    pub turn: AgentToolInput,
    pub documents: Vec<Document>,
}


#[derive(Debug, Clone)]
pub struct WithContext {
    pub turn: AgentToolInput,
    pub documents: Vec<Document>,
    pub ids: Vec<String>,
    pub context: String,
}


#[derive(Debug, Clone)]
pub struct WithOutput {
    pub turn: AgentToolInput,
    pub documents: Vec<Document>,
    pub ids: Vec<String>,
    pub context: String,
    pub output: String,
}

/// Everything the pipeline produced for one turn.
#[derive(Debug, Clone)]
pub struct RetrievalRecord {
    pub turn: AgentToolInput,
    pub documents: Vec<Document>,
    pub ids: Vec<String>,
    pub context: String,
    pub output: String,
    pub response_id: String,
}

/// Source node ids in retrieval order. Duplicates are kept.
pub fn extract_document_ids(documents: &[Document]) -> Result<Vec<String>> {
    documents
        .iter()
        .enumerate()
        .map(|(rank, document)| {
            document
                .id()
                .map(str::to_string)
                .ok_or(MovieAgentError::MissingDocumentId { rank })
        })
        .collect()
}

/// Full-fidelity JSON rendering of the documents, used as prompt context.
pub fn docs_to_json(documents: &[Document]) -> Result<String> {
    Ok(serde_json::to_string(documents)?)
}


pub fn attach_context(record: WithDocuments) -> Result<WithContext> {
    let ids = extract_document_ids(&record.documents)?;
    let context = docs_to_json(&record.documents)?;
    Ok(WithContext {
        turn: record.turn,
        documents: record.documents,
        ids,
        context,
    })
}


pub struct VectorRetrievalChain {
    retriever: Arc<dyn Retriever>,
    answerer: Arc<dyn AnswerGenerator>,
    history: Arc<dyn HistoryStore>,
    top_k: usize,
}

impl VectorRetrievalChain {

    pub fn new(
        retriever: Arc<dyn Retriever>,
        answerer: Arc<dyn AnswerGenerator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            retriever,
            answerer,
            history,
            top_k: crate::DEFAULT_TOP_K,
        }
    }


    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }


    pub async fn retrieve(&self, turn: AgentToolInput) -> Result<WithDocuments> {
        let documents = self
            .retriever
            .retrieve(&turn.rephrased_question, self.top_k)
            .await?;
        debug!(
            "Retrieved {} documents for '{}'",
            documents.len(),
            crate::safe_truncate_ellipsis(&turn.rephrased_question, 60)
        );
        Ok(WithDocuments { turn, documents })
    }


    pub async fn answer(&self, record: WithContext) -> Result<WithOutput> {
        let output = self
            .answerer
            .generate_answer(&record.turn.rephrased_question, &record.context)
            .await?;
        Ok(WithOutput {
            turn: record.turn,
            documents: record.documents,
            ids: record.ids,
            context: record.context,
            output,
        })
    }


    pub async fn persist(&self, record: WithOutput) -> Result<RetrievalRecord> {
        let entry = HistoryEntry {
            session_id: record.turn.session_id.clone(),
            source: ResponseSource::Vector,
            input: record.turn.input.clone(),
            rephrased_question: record.turn.rephrased_question.clone(),
            output: record.output.clone(),
            ids: record.ids.clone(),
            cypher: None,
        };
        let response_id = self.history.save_history(&entry).await?;

        Ok(RetrievalRecord {
            turn: record.turn,
            documents: record.documents,
            ids: record.ids,
            context: record.context,
            output: record.output,
            response_id,
        })
    }

    /// Runs every step and returns the complete record.
    pub async fn run(&self, turn: AgentToolInput) -> Result<RetrievalRecord> {
        let retrieved = self.retrieve(turn).await?;
        let contextualized = attach_context(retrieved)?;
        let answered = self.answer(contextualized).await?;
        let record = self.persist(answered).await?;

        info!(
            "Vector answer saved as {} (session={}, sources={})",
            record.response_id,
            record.turn.session_id,
            record.ids.len()
        );
        Ok(record)
    }

    /// Runs the pipeline and keeps only the generated answer.
    pub async fn invoke(&self, turn: AgentToolInput) -> Result<String> {
        Ok(self.run(turn).await?.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::testing::{movie_document, FakeAnswerer, FakeHistory, FakeRetriever};

    fn hanks_documents() -> Vec<Document> {
        vec![
            movie_document("4:m:1", "Forrest Gump", "A slow-witted but kind man witnesses history."),
            movie_document("4:m:2", "Cast Away", "A FedEx executive is stranded on an island."),
            movie_document("4:m:3", "Big", "A boy wakes up in the body of an adult."),
            movie_document("4:m:4", "Philadelphia", "A lawyer sues his firm for wrongful dismissal."),
            movie_document("4:m:1", "Forrest Gump", "A slow-witted but kind man witnesses history."),
        ]
    }

    fn turn() -> AgentToolInput {
        AgentToolInput::new("session-42", "what are tom's best films?", "best Tom Hanks movies")
    }

    #[test]
    fn test_extract_ids_keeps_order_and_duplicates() {
        let ids = extract_document_ids(&hanks_documents()).unwrap();
        assert_eq!(ids, vec!["4:m:1", "4:m:2", "4:m:3", "4:m:4", "4:m:1"]);
        assert!(extract_document_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_extract_ids_reports_rank_of_missing_id() {
        let mut documents = hanks_documents();
        documents[2].metadata.remove("_id");
        assert!(matches!(
            extract_document_ids(&documents),
            Err(MovieAgentError::MissingDocumentId { rank: 2 })
        ));
    }

    #[test]
    fn test_docs_to_json_round_trips() {
        let documents = hanks_documents();
        let json = docs_to_json(&documents).unwrap();
        let parsed: Vec<Document> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, documents);
        assert!(json.starts_with(r#"[{"pageContent":"A slow-witted"#));
    }

    #[tokio::test]
    async fn test_turn_saved_once_with_five_ids() {
        let retriever = Arc::new(FakeRetriever::returning(hanks_documents()));
        let answerer = Arc::new(FakeAnswerer::replying("Forrest Gump and Cast Away stand out."));
        let history = Arc::new(FakeHistory::new());
        let chain = VectorRetrievalChain::new(retriever.clone(), answerer.clone(), history.clone());

        let output = chain.invoke(turn()).await.unwrap();

        assert_eq!(output, "Forrest Gump and Cast Away stand out.");
        assert_eq!(retriever.queries(), vec![("best Tom Hanks movies".to_string(), 5)]);

        let saved = history.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].ids.len(), 5);
        assert_eq!(saved[0].source, ResponseSource::Vector);
        assert_eq!(saved[0].session_id, "session-42");
        assert_eq!(saved[0].input, "what are tom's best films?");
        assert_eq!(saved[0].rephrased_question, "best Tom Hanks movies");
        assert_eq!(saved[0].output, output);
        assert_eq!(saved[0].cypher, None);
    }

    #[tokio::test]
    async fn test_answerer_gets_rephrased_question_and_full_context() {
        let documents = hanks_documents();
        let answerer = Arc::new(FakeAnswerer::replying("ok"));
        let chain = VectorRetrievalChain::new(
            Arc::new(FakeRetriever::returning(documents.clone())),
            answerer.clone(),
            Arc::new(FakeHistory::new()),
        );

        let record = chain.run(turn()).await.unwrap();

        let calls = answerer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "best Tom Hanks movies");
        assert_eq!(calls[0].1, docs_to_json(&documents).unwrap());
        assert_eq!(record.context, calls[0].1);
        assert_eq!(record.response_id, "response-1");
        assert_eq!(record.documents, documents);
    }

    #[tokio::test]
    async fn test_retrieval_failure_saves_nothing() {
        let answerer = Arc::new(FakeAnswerer::replying("unused"));
        let history = Arc::new(FakeHistory::new());
        let chain = VectorRetrievalChain::new(
            Arc::new(FakeRetriever::failing()),
            answerer.clone(),
            history.clone(),
        );

        let result = chain.invoke(turn()).await;

        assert!(matches!(result, Err(MovieAgentError::Retrieval(_))));
        assert!(answerer.calls().is_empty());
        assert!(history.saved().is_empty());
    }

    #[tokio::test]
    async fn test_history_failure_is_a_hard_error() {
        let chain = VectorRetrievalChain::new(
            Arc::new(FakeRetriever::returning(hanks_documents())),
            Arc::new(FakeAnswerer::replying("answer that never reaches the caller")),
            Arc::new(FakeHistory::failing()),
        );

        let result = chain.invoke(turn()).await;
        assert!(matches!(result, Err(MovieAgentError::History(_))));
    }

    #[tokio::test]
    async fn test_top_k_is_forwarded() {
        let retriever = Arc::new(FakeRetriever::returning(hanks_documents()));
        let history = Arc::new(FakeHistory::new());
        let chain = VectorRetrievalChain::new(
            retriever.clone(),
            Arc::new(FakeAnswerer::replying("ok")),
            history.clone(),
        )
        .with_top_k(2);

        chain.invoke(turn()).await.unwrap();

        assert_eq!(retriever.queries()[0].1, 2);
        assert_eq!(history.saved()[0].ids, vec!["4:m:1", "4:m:2"]);
    }
}
