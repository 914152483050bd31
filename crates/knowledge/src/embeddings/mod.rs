//! Embedding service for the answering pipeline.
//!
//! [`Embedder`] is constructed once at startup and shared by ingestion and
//! retrieval. The underlying provider is loaded on the first `embed` call;
//! concurrent first calls are coalesced so the load happens exactly once,
//! and later calls read the loaded handle without locking.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use futures::future::BoxFuture;
use kbase_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Produces the provider on first use.
pub type ProviderLoader =
    Box<dyn Fn() -> BoxFuture<'static, AppResult<Arc<dyn EmbeddingProvider>>> + Send + Sync>;

/// Process-wide embedding service.
pub struct Embedder {
    config: EmbeddingConfig,
    provider: OnceCell<Arc<dyn EmbeddingProvider>>,
    loader: Option<ProviderLoader>,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("config", &self.config)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Embedder {
    /// Embedder that loads the configured provider lazily.
    pub fn new(config: EmbeddingConfig) -> Self {
        let load_config = config.clone();
        Self::with_loader(config, move || {
            let config = load_config.clone();
            Box::pin(async move { create_provider(&config).await })
        })
    }

    /// Embedder with a custom load step.
    pub fn with_loader<F>(config: EmbeddingConfig, loader: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, AppResult<Arc<dyn EmbeddingProvider>>> + Send + Sync + 'static,
    {
        Self {
            config,
            provider: OnceCell::new(),
            loader: Some(Box::new(loader)),
        }
    }

    /// Embedder around an already loaded provider.
    pub fn from_provider(mut config: EmbeddingConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        config.model = provider.model_name().to_string();
        Self {
            config,
            provider: OnceCell::from(provider),
            loader: None,
        }
    }

    /// Model name recorded next to cached document vectors.
    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    pub fn is_loaded(&self) -> bool {
        self.provider.initialized()
    }

    async fn provider(&self) -> AppResult<&Arc<dyn EmbeddingProvider>> {
        self.provider
            .get_or_try_init(|| async {
                let loader = self.loader.as_ref().ok_or_else(|| {
                    AppError::EmbeddingUnavailable("No embedding provider configured".to_string())
                })?;

                tracing::info!(
                    "Loading embedding provider '{}' (model: {})",
                    self.config.provider,
                    self.config.model
                );

                loader().await.map_err(into_unavailable)
            })
            .await
    }

    /// Embed one text.
    ///
    /// # Errors
    /// * `EmbeddingUnavailable` - the provider could not be loaded or failed
    /// * `EmbeddingTimeout` - the call exceeded the configured deadline
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let provider = self.provider().await?;
        let secs = self.config.timeout_secs;

        let vector = match tokio::time::timeout(Duration::from_secs(secs), provider.embed(text)).await
        {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => return Err(into_unavailable(e)),
            Err(_) => {
                tracing::warn!("Embedding call exceeded {}s", secs);
                return Err(AppError::EmbeddingTimeout(secs));
            }
        };

        if vector.is_empty() {
            return Err(AppError::EmbeddingUnavailable(
                "Provider returned an empty vector".to_string(),
            ));
        }

        Ok(if self.config.normalize {
            l2_normalize(vector)
        } else {
            vector
        })
    }
}

fn into_unavailable(err: AppError) -> AppError {
    match err {
        AppError::EmbeddingUnavailable(_) | AppError::EmbeddingTimeout(_) => err,
        other => AppError::EmbeddingUnavailable(other.to_string()),
    }
}

/// Scale a vector to unit length; zero vectors are returned unchanged.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}
