

use std::sync::Arc;
use tracing::{info, warn};

use crate::chains::answer_generation::{AnswerGenerationChain, AnswerGenerator};
use crate::chains::cypher_generation::CypherGenerationChain;
use crate::chains::cypher_guard::CypherGuard;
use crate::chains::cypher_retrieval::CypherRetrievalChain;
use crate::chains::rephrase_question::RephraseQuestionChain;
use crate::chains::vector_retrieval::{AgentToolInput, VectorRetrievalChain};
use crate::core::config::MovieAgentConfig;
use crate::core::error::Result;
use crate::db::client::Neo4jClient;
use crate::db::history::{ChatTurn, HistoryStore, Neo4jHistoryStore};
use crate::db::schema::GraphStore;
use crate::db::vector::{Neo4jVectorRetriever, Retriever};
use crate::llm::factory::{EmbeddingProviderFactory, LlmProviderFactory};
use crate::llm::providers::base::LlmProvider;

/// Previous turns shown to the model when rephrasing a follow-up.
pub const HISTORY_WINDOW: usize = 5;

/// Entry point wiring the Neo4j collaborators and the language model into the
/// question-answering pipelines.
pub struct MovieAgent {
    config: MovieAgentConfig,
    graph: Arc<dyn GraphStore>,
    history: Arc<dyn HistoryStore>,
    rephraser: RephraseQuestionChain,
    cypher_generation: CypherGenerationChain,
    vector_chain: VectorRetrievalChain,
    cypher_chain: CypherRetrievalChain,
}

impl MovieAgent {
    /// Validates the config, connects to Neo4j and builds every provider.
    pub async fn new(config: MovieAgentConfig) -> Result<Self> {
        config.validate()?;

        let client = Neo4jClient::from_config(&config).await?;
        let llm = LlmProviderFactory::from_config(&config)?;
        let embeddings = Arc::new(EmbeddingProviderFactory::from_config(&config)?);

        let retriever: Arc<dyn Retriever> = Arc::new(Neo4jVectorRetriever::new(
            client.clone(),
            embeddings,
            config.vector_index.clone(),
        ));
        let history: Arc<dyn HistoryStore> = Arc::new(Neo4jHistoryStore::new(client.clone()));
        // Generated Cypher reaches the database only through `graph`.
        let graph: Arc<dyn GraphStore> = match Neo4jClient::read_only_from_config(&config).await? {
            Some(reader) => {
                info!("Generated Cypher runs under the read-only login");
                Arc::new(reader)
            }
            None => {
                warn!("NEO4J_READ_USERNAME not set; generated Cypher runs with the main login");
                Arc::new(client)
            }
        };

        Self::from_parts(config, graph, llm, retriever, history)
    }

    /// Builds the agent around already constructed collaborators.
    pub fn from_parts(
        config: MovieAgentConfig,
        graph: Arc<dyn GraphStore>,
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn Retriever>,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self> {
        let answerer: Arc<dyn AnswerGenerator> = Arc::new(AnswerGenerationChain::new(llm.clone())?);

        let vector_chain =
            VectorRetrievalChain::new(retriever, answerer.clone(), history.clone())
                .with_top_k(config.top_k);
        let cypher_chain = CypherRetrievalChain::new(
            CypherGenerationChain::new(graph.clone(), llm.clone())?,
            CypherGuard::new(config.cypher_max_limit),
            graph.clone(),
            answerer,
            history.clone(),
        );

        info!(
            "MovieAgent ready: llm={}/{}, index={}, top_k={}",
            llm.provider_name(),
            llm.model_name(),
            config.vector_index,
            config.top_k
        );

        Ok(Self {
            rephraser: RephraseQuestionChain::new(llm.clone())?,
            cypher_generation: CypherGenerationChain::new(graph.clone(), llm)?,
            config,
            graph,
            history,
            vector_chain,
            cypher_chain,
        })
    }

    /// Cypher for the question, as the model wrote it. Nothing is executed.
    pub async fn generate_cypher(&self, question: &str) -> Result<String> {
        self.cypher_generation.invoke(question).await
    }

    /// Answers from the plot documents nearest to the (rephrased) question.
    pub async fn ask_vector(&self, session_id: &str, input: &str) -> Result<String> {
        let turn = self.prepare(session_id, input).await?;
        self.vector_chain.invoke(turn).await
    }

    /// Answers by running guarded, generated Cypher against the graph.
    pub async fn ask_graph(&self, session_id: &str, input: &str) -> Result<String> {
        let turn = self.prepare(session_id, input).await?;
        self.cypher_chain.invoke(turn).await
    }


    pub async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        self.history.get_history(session_id, limit).await
    }


    pub async fn schema(&self) -> Result<String> {
        self.graph.schema().await
    }


    pub fn config(&self) -> &MovieAgentConfig {
        &self.config
    }

    async fn prepare(&self, session_id: &str, input: &str) -> Result<AgentToolInput> {
        let previous = self.history.get_history(session_id, HISTORY_WINDOW).await?;
        self.rephraser.prepare(session_id, input, &previous).await
    }
}
