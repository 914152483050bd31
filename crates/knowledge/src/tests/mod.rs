//! Crate-level scenario tests with scripted collaborators.


use crate::bootstrap::{ServiceParts, Services};
use crate::embeddings::{Embedder, EmbeddingConfig, EmbeddingProvider};
use crate::store::SqliteStore;
use kbase_core::{AppError, AppResult, GenerationSettings, RetrievalSettings};
use kbase_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use kbase_prompt::grounded_answer_prompt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const TABLE_MODEL: &str = "table-v1";

/// Embedding provider answering from a fixed text -> vector table.
#[derive(Debug)]
pub(crate) struct TableEmbeddings {
    table: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    seen: Mutex<Vec<String>>,
}

impl TableEmbeddings {
    pub(crate) fn new(entries: &[(&str, Vec<f32>)], fallback: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            table: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            fallback,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TableEmbeddings {
    fn provider_name(&self) -> &str {
        "table"
    }

    fn model_name(&self) -> &str {
        TABLE_MODEL
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Generation capability returning a canned reply.
pub(crate) struct ScriptedLlm {
    reply: Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
    last_request: Mutex<Option<LlmRequest>>,
}

impl ScriptedLlm {
    pub(crate) fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub(crate) fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<LlmRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        tokio::time::sleep(self.delay).await;

        match &self.reply {
            Ok(content) => Ok(LlmResponse {
                content: content.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            }),
            Err(message) => Err(AppError::Llm(message.clone())),
        }
    }
}

/// A wired pipeline plus handles on its scripted collaborators.
pub(crate) struct Harness {
    pub services: Services,
    pub store: Arc<SqliteStore>,
    pub embeddings: Arc<TableEmbeddings>,
    pub llm: Arc<ScriptedLlm>,
}

pub(crate) fn harness(embeddings: Arc<TableEmbeddings>, llm: Arc<ScriptedLlm>) -> Harness {
    harness_with(embeddings, llm, RetrievalSettings::default(), GenerationSettings::default())
}

pub(crate) fn harness_with(
    embeddings: Arc<TableEmbeddings>,
    llm: Arc<ScriptedLlm>,
    retrieval: RetrievalSettings,
    generation: GenerationSettings,
) -> Harness {
    let embedder = Arc::new(Embedder::from_provider(
        EmbeddingConfig::default(),
        embeddings.clone(),
    ));
    harness_from(embedder, embeddings, llm, retrieval, generation)
}

pub(crate) fn harness_from(
    embedder: Arc<Embedder>,
    embeddings: Arc<TableEmbeddings>,
    llm: Arc<ScriptedLlm>,
    retrieval: RetrievalSettings,
    generation: GenerationSettings,
) -> Harness {
    let store = Arc::new(SqliteStore::in_memory().unwrap());

    let services = Services::from_parts(ServiceParts {
        documents: store.clone(),
        messages: store.clone(),
        embedder,
        client: llm.clone(),
        model: "scripted-model".to_string(),
        prompt: grounded_answer_prompt(),
        retrieval,
        generation,
    });

    Harness {
        services,
        store,
        embeddings,
        llm,
    }
}
