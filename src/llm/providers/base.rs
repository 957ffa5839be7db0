

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum LlmProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Empty completion from {0}")]
    EmptyCompletion(String),
}


#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmMetadata {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_prompt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_completion: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_total: Option<u32>,
}

impl LlmMetadata {
    /// Token usage for log lines, e.g. `120+35=155 tokens`.
    pub fn usage(&self) -> String {
        match (self.tokens_prompt, self.tokens_completion, self.tokens_total) {
            (Some(prompt), Some(completion), Some(total)) => {
                format!("{}+{}={} tokens", prompt, completion, total)
            }
            (_, _, Some(total)) => format!("{} tokens", total),
            _ => "usage not reported".to_string(),
        }
    }
}

/// A chat completion backend.
///
/// `system_prompt` may be empty, in which case only the user turn is sent.
#[async_trait]
pub trait LlmProvider: Send + Sync {

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, LlmMetadata), LlmProviderError>;


    fn provider_name(&self) -> &str;


    fn model_name(&self) -> &str;
}


#[async_trait]
impl LlmProvider for Arc<dyn LlmProvider> {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        (**self).generate(system_prompt, user_prompt).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Role/content pairs for a single-shot chat; an empty system prompt is dropped.
pub(crate) fn chat_turns(system_prompt: &str, user_prompt: &str) -> Vec<(&'static str, String)> {
    let mut turns = Vec::with_capacity(2);
    if !system_prompt.trim().is_empty() {
        turns.push(("system", system_prompt.to_string()));
    }
    turns.push(("user", user_prompt.to_string()));
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_turns_skip_empty_system() {
        let turns = chat_turns("  ", "Who directed Heat?");
        assert_eq!(turns, vec![("user", "Who directed Heat?".to_string())]);
    }

    #[test]
    fn test_chat_turns_order() {
        let turns = chat_turns("You are terse.", "Who directed Heat?");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].0, "system");
        assert_eq!(turns[1].0, "user");
    }

    #[test]
    fn test_usage_summary() {
        let mut metadata = LlmMetadata {
            provider: "ollama".to_string(),
            model: "llama3.1:8b".to_string(),
            ..Default::default()
        };
        assert_eq!(metadata.usage(), "usage not reported");

        metadata.tokens_total = Some(155);
        assert_eq!(metadata.usage(), "155 tokens");

        metadata.tokens_prompt = Some(120);
        metadata.tokens_completion = Some(35);
        assert_eq!(metadata.usage(), "120+35=155 tokens");
    }
}
