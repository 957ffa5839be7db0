//! Prompt pipelines that turn a movie question into an answer.

pub mod answer_generation;
pub mod cypher_generation;
pub mod cypher_guard;
pub mod cypher_retrieval;
pub mod rephrase_question;
pub mod vector_retrieval;

#[cfg(test)]
pub mod testing;

pub use answer_generation::{AnswerGenerationChain, AnswerGenerator};
pub use cypher_generation::CypherGenerationChain;
pub use cypher_guard::{CypherGuard, UnsafeCypher};
pub use cypher_retrieval::{CypherRecord, CypherRetrievalChain};
pub use rephrase_question::RephraseQuestionChain;
pub use vector_retrieval::{AgentToolInput, RetrievalRecord, VectorRetrievalChain};
