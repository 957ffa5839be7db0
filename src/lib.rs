//! Movie question answering over a Neo4j graph.
//!
//! Two independent pipelines sit on top of external collaborators (a language
//! model, the graph store, its vector index and a conversation history store):
//!
//! * [`chains::CypherGenerationChain`] turns a question into a Cypher statement
//!   using the live graph schema.
//! * [`chains::VectorRetrievalChain`] answers a conversation turn from the top
//!   ranked plot documents and records the turn in the session history.
//!
//! [`MovieAgent`] connects the Neo4j and model collaborators from a
//! [`MovieAgentConfig`] and adds a guarded Cypher answering path on top. The
//! `movie-agent-mcp` binary exposes it over MCP stdio.

pub mod chains;
pub mod core;
pub mod db;
pub mod llm;
pub mod mcp;
pub mod utils;

pub use utils::{safe_truncate, safe_truncate_ellipsis};


pub use core::agent::MovieAgent;
pub use core::config::MovieAgentConfig;
pub use core::error::{MovieAgentError, Result};
pub use db::{Document, GraphStore, HistoryStore, Neo4jClient, Retriever};
pub use llm::embeddings::EmbeddingGenerator;


pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";


pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";


pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";


pub const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";


pub const DEFAULT_NEO4J_URI: &str = "neo4j://localhost:7687";


pub const DEFAULT_VECTOR_INDEX: &str = "moviePlots";

/// Number of documents handed to the answer generator by the vector path.
pub const DEFAULT_TOP_K: usize = 5;

/// Result cap the Cypher prompt asks for and the guard enforces.
pub const DEFAULT_CYPHER_MAX_LIMIT: usize = 10;
