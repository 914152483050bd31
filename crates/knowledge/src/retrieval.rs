//! Retrieval: question embedding, document vectors and ranking.

use crate::embeddings::Embedder;
use crate::rank::{embedding_input, is_candidate, rank};
use crate::store::DocumentStore;
use crate::types::{Document, Match};
use futures::stream::{self, StreamExt, TryStreamExt};
use kbase_core::{AppResult, RetrievalSettings};
use std::sync::Arc;

/// Finds the documents that can ground an answer to a question.
pub struct Retriever {
    embedder: Arc<Embedder>,
    documents: Arc<dyn DocumentStore>,
    settings: RetrievalSettings,
}

impl Retriever {
    pub fn new(
        embedder: Arc<Embedder>,
        documents: Arc<dyn DocumentStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            documents,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    /// Rank every stored document against `question`.
    ///
    /// Documents too short to ground an answer are dropped before any
    /// embedding work. Cached vectors are reused when they came from the
    /// active model; missing ones are computed with bounded concurrency and
    /// written back to the store.
    pub async fn retrieve(&self, question: &str) -> AppResult<Vec<Match>> {
        let query = self.embedder.embed(question).await?;

        let candidates: Vec<Document> = self
            .documents
            .find_all()
            .await?
            .into_iter()
            .filter(|doc| is_candidate(doc, &self.settings))
            .collect();

        tracing::info!(candidates = candidates.len(), "Ranking documents");

        // `buffered` keeps input order, so the ranking never depends on
        // which embedding call finishes first
        let scored: Vec<(Document, Vec<f32>)> = stream::iter(candidates)
            .map(|doc| self.document_vector(doc))
            .buffered(self.settings.concurrency.max(1))
            .try_collect()
            .await?;

        let matches = rank(&query, scored, &self.settings);

        tracing::info!(
            matches = matches.len(),
            top_similarity = ?matches.first().map(|m| m.similarity),
            "Retrieval complete"
        );

        Ok(matches)
    }

    /// Embed a document's leading slice and cache the result.
    ///
    /// A failed cache write is logged; the vector is still returned.
    pub async fn embed_document(&self, document: &Document) -> AppResult<Vec<f32>> {
        let input = embedding_input(&document.content, self.settings.embedding_input_chars);
        let vector = self.embedder.embed(input).await?;

        if let Err(e) = self
            .documents
            .set_embedding(&document.id, &vector, self.embedder.model_name())
            .await
        {
            tracing::warn!(doc_id = %document.id, "Failed to cache embedding: {}", e);
        }

        Ok(vector)
    }

    async fn document_vector(&self, mut document: Document) -> AppResult<(Document, Vec<f32>)> {
        if let Some(vector) = document
            .cached_embedding(self.embedder.model_name())
            .map(<[f32]>::to_vec)
        {
            return Ok((document, vector));
        }

        tracing::debug!(doc_id = %document.id, "Embedding document on read");
        let vector = self.embed_document(&document).await?;
        document.embedding = Some(vector.clone());
        document.embedding_model = Some(self.embedding_model().to_string());
        Ok((document, vector))
    }
}
