

use std::sync::Arc;

use super::embeddings::EmbeddingGenerator;
use super::providers::base::LlmProvider;
use super::providers::ollama::OllamaProvider;
use super::providers::openai::OpenAiProvider;
use crate::core::config::MovieAgentConfig;
use crate::core::error::{MovieAgentError, Result};
use crate::{DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_URL};


pub struct LlmProviderFactory;

impl LlmProviderFactory {

    pub fn create(
        provider: &str,
        model: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        temperature: f64,
        timeout_secs: u64,
    ) -> Result<Arc<dyn LlmProvider>> {
        let provider: Arc<dyn LlmProvider> = match provider {
            "openai" => {
                let api_key = api_key.ok_or_else(|| {
                    MovieAgentError::Config("openai provider requires an API key".to_string())
                })?;
                Arc::new(OpenAiProvider::new(api_key, base_url, model, temperature, timeout_secs)?)
            }
            "ollama" => Arc::new(OllamaProvider::new(
                base_url.unwrap_or(DEFAULT_OLLAMA_URL),
                model,
                temperature,
                timeout_secs,
            )?),
            other => {
                return Err(MovieAgentError::Config(format!(
                    "Unknown provider: {other}. Supported: openai, ollama"
                )));
            }
        };
        Ok(provider)
    }


    pub fn from_config(config: &MovieAgentConfig) -> Result<Arc<dyn LlmProvider>> {
        Self::create(
            &config.llm_provider,
            &config.llm_model,
            config.llm_api_key.as_deref(),
            config.llm_base_url.as_deref(),
            config.llm_temperature,
            config.timeout,
        )
    }
}


pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {

    pub fn from_config(config: &MovieAgentConfig) -> Result<EmbeddingGenerator> {
        // The Ollama default URL means "not set" for a hosted provider.
        let url = if config.embedding_provider == "openai" && config.embedding_url == DEFAULT_OLLAMA_URL {
            DEFAULT_OPENAI_URL.to_string()
        } else {
            config.embedding_url.clone()
        };

        let api_key = config
            .embedding_api_key
            .clone()
            .or_else(|| {
                (config.embedding_provider == "openai")
                    .then(|| config.llm_api_key.clone())
                    .flatten()
            });

        Ok(EmbeddingGenerator::new(
            config.embedding_provider.clone(),
            url,
            config.embedding_model.clone(),
            api_key,
            config.timeout,
        )?)
    }
}
