

use std::sync::Arc;
use tracing::{debug, info};

use crate::core::error::Result;
use crate::db::schema::GraphStore;
use crate::llm::prompt::PromptTemplate;
use crate::llm::providers::base::LlmProvider;

/// Instructions for turning a movie question into a single Cypher statement.
pub const CYPHER_GENERATION_TEMPLATE: &str = r#"
You are a Neo4j Developer translating user questions into Cypher to answer questions
about movies and provide recommendations.
Convert the user's question into a Cypher statement based on the schema.

You must:
* Only use the nodes, relationships and properties mentioned in the schema.
* When required, use `IS NOT NULL` to check for property existence, and not the exists() function.
* Use the `elementId()` function to return the unique identifier for a node or relationship as `_id`.
    For example:
    ```
    MATCH (a:Person)-[:ACTED_IN]->(m:Movie)
    WHERE a.name = 'Emil Eifrem'
    RETURN m.title AS title, elementId(m) AS _id, a.role AS role
    ```
* Include extra information about the nodes that may help an LLM provide a more informative answer,
    for example the release date, rating or budget.
* For movies, use the tmdbId property to return a source URL.
    For example: `'https://www.themoviedb.org/movie/'+ m.tmdbId AS source`.
* For movie titles that begin with "The", move "the" to the end.
    For example "The 39 Steps" becomes "39 Steps, The" or "the matrix" becomes "Matrix, The".
* Limit the maximum number of results to 10.
* Respond with only a Cypher statement. No preamble.


Example Question: What role did Tom Hanks play in Toy Story?
Example Cypher:
MATCH (a:Actor {{name: 'Tom Hanks'}})-[rel:ACTED_IN]->(m:Movie {{title: 'Toy Story'}})
RETURN a.name AS Actor, m.title AS Movie, elementId(m) AS _id, rel.role AS RoleInMovie

Schema:
{schema}

Question:
{question}"#;

/// Question in, Cypher text out.
///
/// The schema is fetched from the graph on every call. The completion is only
/// trimmed; callers that execute it must validate it first (see
/// [`CypherGuard`](super::cypher_guard::CypherGuard)).
pub struct CypherGenerationChain {
    graph: Arc<dyn GraphStore>,
    llm: Arc<dyn LlmProvider>,
    prompt: PromptTemplate,
}

impl CypherGenerationChain {

    pub fn new(graph: Arc<dyn GraphStore>, llm: Arc<dyn LlmProvider>) -> Result<Self> {
        info!(
            "CypherGenerationChain initialized: provider={}/{}",
            llm.provider_name(),
            llm.model_name()
        );
        Ok(Self {
            graph,
            llm,
            prompt: PromptTemplate::new(CYPHER_GENERATION_TEMPLATE)?,
        })
    }


    pub async fn render_prompt(&self, question: &str) -> Result<String> {
        let schema = self.graph.schema().await?;
        Ok(self
            .prompt
            .render(&[("schema", schema.as_str()), ("question", question)])?)
    }


    pub async fn invoke(&self, question: &str) -> Result<String> {
        let prompt = self.render_prompt(question).await?;
        debug!(
            "Generating Cypher for '{}'",
            crate::safe_truncate_ellipsis(question, 60)
        );

        let (completion, metadata) = self.llm.generate("", &prompt).await?;
        let cypher = completion.trim().to_string();

        debug!(
            "Generated Cypher ({}): {}",
            metadata.usage(),
            crate::utils::single_line(&cypher)
        );
        Ok(cypher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::testing::{FakeGraph, FakeLlm};
    use crate::MovieAgentError;

    const SCHEMA: &str = "Node properties are the following:\n\
                          Actor {name: STRING}\n\
                          Movie {title: STRING, tmdbId: STRING}\n\
                          Relationship properties are the following:\n\
                          ACTED_IN {role: STRING}\n\
                          The relationships are the following:\n\
                          (:Actor)-[:ACTED_IN]->(:Movie)";

    const CYPHER: &str = "MATCH (a:Actor {name: 'Tom Hanks'})-[rel:ACTED_IN]->(m:Movie {title: 'Toy Story'})\n\
                          RETURN a.name AS Actor, m.title AS Movie, elementId(m) AS _id, rel.role AS RoleInMovie";

    fn chain(graph: Arc<FakeGraph>, llm: Arc<FakeLlm>) -> CypherGenerationChain {
        CypherGenerationChain::new(graph, llm).unwrap()
    }

    #[tokio::test]
    async fn test_prompt_contains_schema_and_question_verbatim() {
        let graph = Arc::new(FakeGraph::new(SCHEMA, Vec::new()));
        let llm = Arc::new(FakeLlm::replying(CYPHER));
        let question = "What role did Tom Hanks play in Toy Story?";

        let cypher = chain(graph, llm.clone()).invoke(question).await.unwrap();

        assert_eq!(cypher, CYPHER);
        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "");
        let prompt = &calls[0].1;
        assert!(prompt.contains(SCHEMA));
        assert!(prompt.contains(&format!("Question:\n{question}")));
        assert!(prompt.contains("(:Actor)-[:ACTED_IN]->(:Movie)"));
        assert!(prompt.contains("MATCH (a:Actor {name: 'Tom Hanks'})"));
    }

    #[tokio::test]
    async fn test_schema_fetched_on_every_call() {
        let graph = Arc::new(FakeGraph::new(SCHEMA, Vec::new()));
        let chain = chain(graph.clone(), Arc::new(FakeLlm::replying(CYPHER)));

        chain.invoke("Who directed Heat?").await.unwrap();
        chain.invoke("Who directed Heat?").await.unwrap();

        assert_eq!(graph.schema_calls(), 2);
    }

    #[tokio::test]
    async fn test_completion_is_trimmed_not_validated() {
        let llm = Arc::new(FakeLlm::replying("\n  Sorry, I cannot help with that.  \n"));
        let chain = chain(Arc::new(FakeGraph::new(SCHEMA, Vec::new())), llm);

        let output = chain.invoke("Tell me a joke").await.unwrap();
        assert_eq!(output, "Sorry, I cannot help with that.");
    }

    #[tokio::test]
    async fn test_schema_failure_propagates_without_model_call() {
        let llm = Arc::new(FakeLlm::replying(CYPHER));
        let chain = chain(Arc::new(FakeGraph::unreachable()), llm.clone());

        let result = chain.invoke("Who directed Heat?").await;
        assert!(matches!(result, Err(MovieAgentError::Retrieval(_))));
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let chain = chain(
            Arc::new(FakeGraph::new(SCHEMA, Vec::new())),
            Arc::new(FakeLlm::failing("timeout")),
        );
        let result = chain.invoke("Who directed Heat?").await;
        assert!(matches!(result, Err(MovieAgentError::LlmProvider(_))));
    }

    #[tokio::test]
    async fn test_schema_with_braces_inserted_verbatim() {
        let graph = Arc::new(FakeGraph::new(SCHEMA, Vec::new()));
        let chain = chain(graph, Arc::new(FakeLlm::replying(CYPHER)));

        let prompt = chain.render_prompt("movies with {weird} titles").await.unwrap();
        assert!(prompt.contains("Movie {title: STRING, tmdbId: STRING}"));
        assert!(prompt.ends_with("Question:\nmovies with {weird} titles"));
    }
}
