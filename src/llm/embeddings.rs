

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::DEFAULT_OPENAI_URL;


#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,

    #[error("Provider not implemented: {0}")]
    NotImplemented(String),
}


#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

/// Turns question text into the vector space of the plot index.
///
/// The model must match the one used to populate the index; nothing here can
/// detect a mismatch beyond a dimension error from Neo4j.
pub struct EmbeddingGenerator {
    provider: String,
    url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl EmbeddingGenerator {

    pub fn new(
        provider: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        let provider = provider.into().to_lowercase();
        let model = model.into();
        let url = url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        info!(
            "EmbeddingGenerator initialized: provider={}, model={}, url={}",
            provider, model, url
        );

        Ok(Self {
            provider,
            url,
            model,
            api_key,
            client,
        })
    }


    pub async fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let embedding = match self.provider.as_str() {
            "ollama" => self.generate_ollama(text).await?,
            "openai" => self.generate_openai(text).await?,
            other => return Err(EmbeddingError::NotImplemented(other.to_string())),
        };

        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse("zero-length embedding".to_string()));
        }

        debug!(
            "Embedded '{}' into {} dims",
            crate::safe_truncate_ellipsis(text, 40),
            embedding.len()
        );
        Ok(embedding)
    }

    async fn generate_ollama(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.url))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(EmbeddingError::Http)?
            .json::<OllamaEmbeddingResponse>()
            .await?;

        Ok(response.embedding)
    }

    async fn generate_openai(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EmbeddingError::InvalidResponse("API key required".to_string()))?;

        let api_url = if self.url.is_empty() {
            DEFAULT_OPENAI_URL
        } else {
            self.url.as_str()
        };

        let request = OpenAIEmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", api_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(EmbeddingError::Http)?
            .json::<OpenAIEmbeddingResponse>()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }


    pub fn model(&self) -> &str {
        &self.model
    }


    pub fn provider(&self) -> &str {
        &self.provider
    }
}
