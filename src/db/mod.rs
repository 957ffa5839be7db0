

pub mod client;
pub mod history;
pub mod schema;
pub mod vector;

pub use client::{Neo4jClient, Neo4jClientError};
pub use history::{ChatTurn, HistoryEntry, HistoryStore, Neo4jHistoryStore, ResponseSource};
pub use schema::GraphStore;
pub use vector::{Document, Neo4jVectorRetriever, Retriever};
