

pub mod embeddings;
pub mod factory;
pub mod prompt;
pub mod providers;

pub use embeddings::{EmbeddingError, EmbeddingGenerator};
pub use factory::{EmbeddingProviderFactory, LlmProviderFactory};
pub use prompt::{PromptError, PromptTemplate};
pub use providers::{LlmMetadata, LlmProvider, LlmProviderError};
