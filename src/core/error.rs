

use thiserror::Error;

use crate::chains::cypher_guard::UnsafeCypher;
use crate::db::client::Neo4jClientError;
use crate::llm::embeddings::EmbeddingError;
use crate::llm::prompt::PromptError;
use crate::llm::providers::LlmProviderError;


#[derive(Error, Debug)]
pub enum MovieAgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Neo4j error: {0}")]
    Neo4j(#[from] Neo4jClientError),

    #[error("LLM provider error: {0}")]
    LlmProvider(#[from] LlmProviderError),

    #[error("Embedding generation error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Rejected Cypher: {0}")]
    UnsafeCypher(#[from] UnsafeCypher),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("History error: {0}")]
    History(String),

    #[error("Document at rank {rank} has no `_id` metadata")]
    MissingDocumentId { rank: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MovieAgentError {
    /// Errors caused by the caller's input or setup rather than a failing collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Prompt(_) | Self::UnsafeCypher(_)
        )
    }
}


pub type Result<T> = std::result::Result<T, MovieAgentError>;
