

use serde::{Deserialize, Serialize};

use super::error::{MovieAgentError, Result};
use crate::{
    DEFAULT_CYPHER_MAX_LIMIT, DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_MODEL, DEFAULT_NEO4J_URI,
    DEFAULT_OLLAMA_URL, DEFAULT_TOP_K, DEFAULT_VECTOR_INDEX,
};

const SUPPORTED_PROVIDERS: [&str; 2] = ["ollama", "openai"];


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieAgentConfig {

    pub neo4j_uri: String,
    pub neo4j_username: String,
    #[serde(skip_serializing, default)]
    pub neo4j_password: String,
    pub neo4j_database: String,
    /// Optional login with the `reader` role. When set, model-written Cypher runs under it.
    pub neo4j_read_username: Option<String>,
    #[serde(skip_serializing, default)]
    pub neo4j_read_password: Option<String>,


    pub llm_provider: String,
    pub llm_model: String,
    #[serde(skip_serializing)]
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_temperature: f64,


    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    #[serde(skip_serializing)]
    pub embedding_api_key: Option<String>,


    pub vector_index: String,
    pub top_k: usize,
    pub cypher_max_limit: usize,
    pub timeout: u64,
}

impl MovieAgentConfig {

    pub fn new(neo4j_uri: &str, neo4j_username: &str, neo4j_password: &str) -> Self {
        Self {
            neo4j_uri: neo4j_uri.to_string(),
            neo4j_username: neo4j_username.to_string(),
            neo4j_password: neo4j_password.to_string(),
            neo4j_database: "neo4j".to_string(),
            neo4j_read_username: None,
            neo4j_read_password: None,

            llm_provider: "ollama".to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            llm_base_url: None,
            llm_temperature: 0.0,

            embedding_provider: "ollama".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_api_key: None,

            vector_index: DEFAULT_VECTOR_INDEX.to_string(),
            top_k: DEFAULT_TOP_K,
            cypher_max_limit: DEFAULT_CYPHER_MAX_LIMIT,
            timeout: 60,
        }
    }


    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparsable numbers keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(
            &lookup("NEO4J_URI").unwrap_or_else(|| DEFAULT_NEO4J_URI.to_string()),
            &lookup("NEO4J_USERNAME").unwrap_or_else(|| "neo4j".to_string()),
            &lookup("NEO4J_PASSWORD").unwrap_or_default(),
        );

        if let Some(database) = lookup("NEO4J_DATABASE") {
            config.neo4j_database = database;
        }
        config.neo4j_read_username = lookup("NEO4J_READ_USERNAME");
        config.neo4j_read_password = lookup("NEO4J_READ_PASSWORD");
        if let Some(provider) = lookup("MOVIE_AGENT_LLM_PROVIDER") {
            config.llm_provider = provider.to_lowercase();
        }
        if let Some(model) = lookup("MOVIE_AGENT_LLM_MODEL") {
            config.llm_model = model;
        }
        if let Some(key) = lookup("MOVIE_AGENT_LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            config.llm_api_key = Some(key);
        }
        if let Some(url) = lookup("MOVIE_AGENT_LLM_BASE_URL") {
            config.llm_base_url = Some(url);
        }
        if let Some(temperature) = lookup("MOVIE_AGENT_LLM_TEMPERATURE").and_then(|t| t.parse().ok()) {
            config.llm_temperature = temperature;
        }
        if let Some(provider) = lookup("MOVIE_AGENT_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider.to_lowercase();
        }
        if let Some(model) = lookup("MOVIE_AGENT_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(url) = lookup("MOVIE_AGENT_EMBEDDING_URL") {
            config.embedding_url = url;
        }
        if let Some(key) = lookup("MOVIE_AGENT_EMBEDDING_API_KEY") {
            config.embedding_api_key = Some(key);
        }
        if let Some(index) = lookup("MOVIE_AGENT_VECTOR_INDEX") {
            config.vector_index = index;
        }
        if let Some(top_k) = lookup("MOVIE_AGENT_TOP_K").and_then(|k| k.parse().ok()) {
            config.top_k = top_k;
        }
        if let Some(limit) = lookup("MOVIE_AGENT_CYPHER_MAX_LIMIT").and_then(|l| l.parse().ok()) {
            config.cypher_max_limit = limit;
        }
        if let Some(timeout) = lookup("MOVIE_AGENT_TIMEOUT").and_then(|t| t.parse().ok()) {
            config.timeout = timeout;
        }

        config
    }


    pub fn validate(&self) -> Result<()> {
        if self.neo4j_uri.trim().is_empty() {
            return Err(MovieAgentError::Config("NEO4J_URI must not be empty".to_string()));
        }
        url::Url::parse(&self.neo4j_uri)
            .map_err(|e| MovieAgentError::Config(format!("invalid NEO4J_URI '{}': {}", self.neo4j_uri, e)))?;

        if self.neo4j_read_password.is_some() && self.neo4j_read_username.is_none() {
            return Err(MovieAgentError::Config(
                "NEO4J_READ_PASSWORD is set without NEO4J_READ_USERNAME".to_string(),
            ));
        }

        for (kind, provider) in [("LLM", &self.llm_provider), ("embedding", &self.embedding_provider)] {
            if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
                return Err(MovieAgentError::Config(format!(
                    "unknown {kind} provider '{provider}'. Supported: ollama, openai"
                )));
            }
        }

        if self.top_k == 0 {
            return Err(MovieAgentError::Config("top_k must be at least 1".to_string()));
        }
        if self.cypher_max_limit == 0 {
            return Err(MovieAgentError::Config("cypher_max_limit must be at least 1".to_string()));
        }
        if self.vector_index.trim().is_empty() {
            return Err(MovieAgentError::Config("vector index name must not be empty".to_string()));
        }

        Ok(())
    }

    /// `(username, password)` of the read-only login, if one is configured.
    pub fn read_credentials(&self) -> Option<(&str, &str)> {
        let username = self.neo4j_read_username.as_deref()?;
        Some((username, self.neo4j_read_password.as_deref().unwrap_or_default()))
    }
}

impl Default for MovieAgentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NEO4J_URI, "neo4j", "")
    }
}
