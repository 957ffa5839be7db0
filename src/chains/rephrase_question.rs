

use std::sync::Arc;
use tracing::debug;

use super::vector_retrieval::AgentToolInput;
use crate::core::error::Result;
use crate::db::history::ChatTurn;
use crate::llm::prompt::PromptTemplate;
use crate::llm::providers::base::LlmProvider;


pub const REPHRASE_QUESTION_TEMPLATE: &str = r#"Given the following conversation and a question,
rephrase the follow-up question to be a standalone question about the
subject of the conversation history.

If you do not have the information required to construct
a standalone question, ask for clarification.

Always include the subject of the history in the question.

History:
{history}

Question:
{input}"#;

/// Turns a follow-up like "what else was he in?" into a question that can be
/// answered without the conversation.
pub struct RephraseQuestionChain {
    llm: Arc<dyn LlmProvider>,
    prompt: PromptTemplate,
}

impl RephraseQuestionChain {

    pub fn new(llm: Arc<dyn LlmProvider>) -> Result<Self> {
        Ok(Self {
            llm,
            prompt: PromptTemplate::new(REPHRASE_QUESTION_TEMPLATE)?,
        })
    }

    /// With no history there is nothing to resolve and the input is returned as is.
    pub async fn rephrase(&self, input: &str, history: &[ChatTurn]) -> Result<String> {
        if history.is_empty() {
            return Ok(input.trim().to_string());
        }

        let history = format_history(history);
        let prompt = self
            .prompt
            .render(&[("history", history.as_str()), ("input", input)])?;
        let (rephrased, _metadata) = self.llm.generate("", &prompt).await?;
        let rephrased = rephrased.trim().to_string();

        debug!(
            "Rephrased '{}' as '{}'",
            crate::safe_truncate_ellipsis(input, 40),
            crate::safe_truncate_ellipsis(&rephrased, 60)
        );
        Ok(rephrased)
    }


    pub async fn prepare(
        &self,
        session_id: &str,
        input: &str,
        history: &[ChatTurn],
    ) -> Result<AgentToolInput> {
        let rephrased_question = self.rephrase(input, history).await?;
        Ok(AgentToolInput::new(session_id, input, rephrased_question))
    }
}


pub fn format_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("Human: {}\nAI: {}", turn.input, turn.output))
        .collect::<Vec<_>>()
        .join("\n")
}
