

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::base::{chat_turns, LlmMetadata, LlmProvider, LlmProviderError};
use crate::DEFAULT_OPENAI_URL;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Any server speaking the OpenAI `/chat/completions` dialect.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    client: Client,
}

impl OpenAiProvider {

    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        model: impl Into<String>,
        temperature: f64,
        timeout_secs: u64,
    ) -> Result<Self, LlmProviderError> {
        let model = model.into();
        let base_url = base_url
            .unwrap_or(DEFAULT_OPENAI_URL)
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        info!("OpenAI-compatible provider initialized (model={}, url={})", model, base_url);
        Ok(Self {
            api_key: api_key.into(),
            base_url,
            model,
            temperature,
            client,
        })
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str) -> ChatRequest {
        let messages = chat_turns(system_prompt, user_prompt)
            .into_iter()
            .map(|(role, content)| ChatMessage {
                role: role.to_string(),
                content: Some(content),
            })
            .collect();

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        let request = self.build_request(system_prompt, user_prompt);
        debug!("Chat completion request: model={}, messages={}", self.model, request.messages.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(LlmProviderError::Http)?
            .json::<ChatResponse>()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmProviderError::Provider("No choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| LlmProviderError::EmptyCompletion(self.base_url.clone()))?;

        let mut metadata = LlmMetadata {
            provider: "openai".to_string(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            ..Default::default()
        };

        if let Some(usage) = response.usage {
            metadata.tokens_prompt = Some(usage.prompt_tokens);
            metadata.tokens_completion = Some(usage.completion_tokens);
            metadata.tokens_total = Some(usage.total_tokens);
        }

        Ok((content, metadata))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
