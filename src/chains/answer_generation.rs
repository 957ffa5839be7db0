

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::core::error::Result;
use crate::llm::prompt::PromptTemplate;
use crate::llm::providers::base::LlmProvider;


pub const ANSWER_SYSTEM_PROMPT: &str =
    "You are a movie expert providing information about movies. Be concise and factual.";


pub const ANSWER_GENERATION_TEMPLATE: &str = r#"Use only the following context to answer the following question.

Question:
{question}

Context:
{context}

Make the answer sound like a response to the question.
Do not mention that you based the answer on the context.

Here is an example:

Question: Who played Woody in Toy Story?
Context: [{{"title": "Toy Story", "actor": "Tom Hanks", "role": "Woody"}}]
Response: Tom Hanks played Woody in Toy Story.

If the context is empty, say that you don't know the answer.
Do not use your pre-trained knowledge to fill gaps.
Include links and sources from the context where possible."#;

/// Produces the final natural-language answer from a question and its context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_answer(&self, question: &str, context: &str) -> Result<String>;
}


pub struct AnswerGenerationChain {
    llm: Arc<dyn LlmProvider>,
    prompt: PromptTemplate,
}

impl AnswerGenerationChain {

    pub fn new(llm: Arc<dyn LlmProvider>) -> Result<Self> {
        Ok(Self {
            llm,
            prompt: PromptTemplate::new(ANSWER_GENERATION_TEMPLATE)?,
        })
    }
}

#[async_trait]
impl AnswerGenerator for AnswerGenerationChain {
    async fn generate_answer(&self, question: &str, context: &str) -> Result<String> {
        let prompt = self
            .prompt
            .render(&[("question", question), ("context", context)])?;

        let (answer, metadata) = self.llm.generate(ANSWER_SYSTEM_PROMPT, &prompt).await?;
        debug!(
            "Answer generated by {}/{} ({} chars, {})",
            metadata.provider,
            metadata.model,
            answer.len(),
            metadata.usage()
        );

        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::testing::FakeLlm;

    #[tokio::test]
    async fn test_prompt_carries_question_and_context() {
        let llm = Arc::new(FakeLlm::replying("  Tom Hanks played Woody.\n"));
        let chain = AnswerGenerationChain::new(llm.clone()).unwrap();

        let answer = chain
            .generate_answer("Who played Woody?", r#"[{"actor":"Tom Hanks"}]"#)
            .await
            .unwrap();

        assert_eq!(answer, "Tom Hanks played Woody.");
        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ANSWER_SYSTEM_PROMPT);
        assert!(calls[0].1.contains("Question:\nWho played Woody?"));
        assert!(calls[0].1.contains(r#"Context:
[{"actor":"Tom Hanks"}]"#));
        assert!(calls[0].1.contains(r#"[{"title": "Toy Story""#));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let chain = AnswerGenerationChain::new(Arc::new(FakeLlm::failing("model offline"))).unwrap();
        let result = chain.generate_answer("q", "[]").await;
        match result {
            Err(crate::MovieAgentError::LlmProvider(err)) => {
                assert!(err.to_string().contains("model offline"))
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }
}
