//! In-memory collaborators for pipeline tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::answer_generation::AnswerGenerator;
use crate::core::error::{MovieAgentError, Result};
use crate::db::history::{ChatTurn, HistoryEntry, HistoryStore};
use crate::db::schema::GraphStore;
use crate::db::vector::{Document, Retriever};
use crate::llm::providers::base::{LlmMetadata, LlmProvider, LlmProviderError};


pub struct FakeLlm {
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    failure: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            fallback: Some(reply.to_string()),
            ..Self::scripted(&[])
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: reason.to_string(),
            ..Self::scripted(&[])
        }
    }

    /// Replies in order, then fails.
    pub fn scripted(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            fallback: None,
            failure: "fake model unavailable".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(system_prompt, user_prompt)` of every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<(String, LlmMetadata), LlmProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| LlmProviderError::Provider(self.failure.clone()))?;

        let metadata = LlmMetadata {
            provider: "fake".to_string(),
            model: "fake-1".to_string(),
            ..Default::default()
        };
        Ok((reply, metadata))
    }

    fn provider_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-1"
    }
}


pub struct FakeGraph {
    schema: String,
    rows: Vec<Value>,
    fail_schema: bool,
    schema_calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl FakeGraph {
    pub fn new(schema: &str, rows: Vec<Value>) -> Self {
        Self {
            schema: schema.to_string(),
            rows,
            fail_schema: false,
            schema_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_schema: true,
            ..Self::new("", Vec::new())
        }
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphStore for FakeGraph {
    async fn schema(&self) -> Result<String> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_schema {
            return Err(MovieAgentError::Retrieval("graph unreachable".to_string()));
        }
        Ok(self.schema.clone())
    }

    async fn query(&self, cypher: &str) -> Result<Vec<Value>> {
        self.queries.lock().unwrap().push(cypher.to_string());
        Ok(self.rows.clone())
    }
}


pub struct FakeRetriever {
    documents: Option<Vec<Document>>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl FakeRetriever {
    pub fn returning(documents: Vec<Document>) -> Self {
        Self {
            documents: Some(documents),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            documents: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        match &self.documents {
            Some(documents) => Ok(documents.iter().take(k).cloned().collect()),
            None => Err(MovieAgentError::Retrieval("vector index unavailable".to_string())),
        }
    }
}


pub struct FakeAnswerer {
    reply: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeAnswerer {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(question, context)` of every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for FakeAnswerer {
    async fn generate_answer(&self, question: &str, context: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((question.to_string(), context.to_string()));
        Ok(self.reply.clone())
    }
}


pub struct FakeHistory {
    turns: Vec<ChatTurn>,
    fail: bool,
    saved: Mutex<Vec<HistoryEntry>>,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::with_turns(Vec::new())
    }

    pub fn with_turns(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns,
            fail: false,
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn saved(&self) -> Vec<HistoryEntry> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for FakeHistory {
    async fn save_history(&self, entry: &HistoryEntry) -> Result<String> {
        if self.fail {
            return Err(MovieAgentError::History("write rejected".to_string()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(entry.clone());
        Ok(format!("response-{}", saved.len()))
    }

    async fn get_history(&self, _session_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        let skip = self.turns.len().saturating_sub(limit);
        Ok(self.turns.iter().skip(skip).cloned().collect())
    }
}


pub fn movie_document(id: &str, title: &str, plot: &str) -> Document {
    Document::new(plot)
        .with_metadata("_id", id)
        .with_metadata("title", title)
}
