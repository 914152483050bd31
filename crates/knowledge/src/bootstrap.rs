//! Service wiring.
//!
//! Every long-lived service is constructed here, once, and handed to the
//! components that need it. Nothing in the pipeline reaches for global
//! state.

use crate::chat::ChatPipeline;
use crate::embeddings::{EmbeddingConfig, Embedder};
use crate::guard::GroundedAnswerGuard;
use crate::ingest::Ingestor;
use crate::retrieval::Retriever;
use crate::store::{DocumentStore, MessageStore, SqliteStore};
use kbase_core::{AppConfig, AppError, AppResult, GenerationSettings, RetrievalSettings};
use kbase_llm::{create_client, LlmClient};
use kbase_prompt::{load_prompt_or_builtin, PromptDefinition, GROUNDED_ANSWER_PROMPT_ID};
use std::sync::Arc;

/// The application's services, wired together.
pub struct Services {
    pub embedder: Arc<Embedder>,
    pub retriever: Arc<Retriever>,
    pub ingestor: Ingestor,
    pub chat: ChatPipeline,
}

/// Explicit dependencies for [`Services::from_parts`].
pub struct ServiceParts {
    pub documents: Arc<dyn DocumentStore>,
    pub messages: Arc<dyn MessageStore>,
    pub embedder: Arc<Embedder>,
    pub client: Arc<dyn LlmClient>,
    pub model: String,
    pub prompt: PromptDefinition,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
}

impl Services {
    /// Open the workspace database and construct every service.
    ///
    /// The embedding provider is not loaded here; that happens on the first
    /// embedding call.
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        config.ensure_kbase_dir()?;

        let store = Arc::new(SqliteStore::open(&config.database_path())?);
        let embedder = Arc::new(Embedder::new(EmbeddingConfig::from_app_config(config)));

        let client = create_client(
            &config.provider,
            config.provider_endpoint(&config.provider).as_deref(),
            config.resolve_api_key(&config.provider).as_deref(),
        )
        .map_err(AppError::Config)?;

        let prompt = load_prompt_or_builtin(&config.workspace, GROUNDED_ANSWER_PROMPT_ID)?;

        tracing::debug!(
            provider = %config.provider,
            model = %config.model,
            embedding_provider = %config.embedding_provider,
            "Services ready"
        );

        Ok(Self::from_parts(ServiceParts {
            documents: store.clone(),
            messages: store,
            embedder,
            client,
            model: config.model.clone(),
            prompt,
            retrieval: config.retrieval.clone(),
            generation: config.generation.clone(),
        }))
    }

    pub fn from_parts(parts: ServiceParts) -> Self {
        let retriever = Arc::new(Retriever::new(
            Arc::clone(&parts.embedder),
            Arc::clone(&parts.documents),
            parts.retrieval,
        ));

        let guard = Arc::new(GroundedAnswerGuard::new(
            parts.client,
            parts.model,
            parts.prompt,
            parts.generation,
        ));

        Self {
            embedder: parts.embedder,
            ingestor: Ingestor::new(parts.documents, Arc::clone(&retriever)),
            chat: ChatPipeline::new(Arc::clone(&retriever), guard, parts.messages),
            retriever,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_database() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            embedding_provider: "mock".to_string(),
            ..Default::default()
        };

        let services = Services::open(&config).unwrap();
        assert!(config.database_path().exists());
        assert!(!services.embedder.is_loaded());
    }

    #[test]
    fn test_open_without_gemini_key_fails() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            provider: "gemini".to_string(),
            api_key: Some("   ".to_string()),
            ..Default::default()
        };

        let err = Services::open(&config).err().unwrap();
        assert!(err.to_string().contains("Gemini API key missing"));
    }
}
