

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::base::{chat_turns, LlmMetadata, LlmProvider, LlmProviderError};
use crate::DEFAULT_OLLAMA_URL;

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}


pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f64,
    client: Client,
}

impl OllamaProvider {

    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout_secs: u64,
    ) -> Result<Self, LlmProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        info!("Ollama provider initialized (model={}, url={})", model, base_url);
        Ok(Self {
            base_url,
            model,
            temperature,
            client,
        })
    }


    pub fn localhost(model: impl Into<String>, temperature: f64) -> Result<Self, LlmProviderError> {
        Self::new(DEFAULT_OLLAMA_URL, model, temperature, 600)
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str) -> OllamaRequest {
        let messages = chat_turns(system_prompt, user_prompt)
            .into_iter()
            .map(|(role, content)| OllamaMessage {
                role: role.to_string(),
                content,
            })
            .collect();

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        }
    }
}

impl OllamaProvider {
    fn metadata(&self, response: &OllamaResponse) -> LlmMetadata {
        LlmMetadata {
            provider: "ollama".to_string(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            tokens_prompt: Some(response.prompt_eval_count),
            tokens_completion: Some(response.eval_count),
            tokens_total: Some(response.prompt_eval_count + response.eval_count),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        let request = self.build_request(system_prompt, user_prompt);
        debug!("Ollama chat request: model={}, messages={}", self.model, request.messages.len());

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(LlmProviderError::Http)?
            .json::<OllamaResponse>()
            .await?;

        let metadata = self.metadata(&response);
        Ok((response.message.content, metadata))
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
