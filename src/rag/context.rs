//! Context retrieval for questions.

use super::ContextChunk;
use crate::config::RagSettings;
use crate::embedding::Embedder;
use crate::error::{FinragError, Result};
use crate::vector_store::{maximal_marginal_relevance, VectorStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Retrieves diverse, relevant passages for a query.
pub struct Retriever {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
    fetch_k: usize,
    lambda: f32,
    min_score: f32,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            k: 6,
            fetch_k: 20,
            lambda: 0.5,
            min_score: f32::NEG_INFINITY,
        }
    }

    /// Create a retriever configured from settings.
    pub fn from_settings(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        settings: &RagSettings,
    ) -> Self {
        Self::new(vector_store, embedder)
            .with_k(settings.k)
            .with_fetch_k(settings.fetch_k)
            .with_lambda(settings.lambda)
            .with_min_score(settings.min_score)
    }

    /// Set the number of passages returned.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the number of candidates fetched before re-ranking.
    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = fetch_k;
        self
    }

    /// Set the relevance/diversity trade-off (1.0 is pure relevance).
    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda.clamp(0.0, 1.0);
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Retrieve the configured number of passages for a query.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ContextChunk>> {
        self.retrieve_k(query, self.k).await
    }

    /// Retrieve `k` passages for a query.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<ContextChunk>> {
        if query.trim().is_empty() {
            return Err(FinragError::InvalidInput("Query is empty".to_string()));
        }

        let query_embedding = self.embedder.embed(query).await?;

        // Threshold before re-ranking so filtered candidates never take a slot
        let candidates = self
            .vector_store
            .search_with_threshold(&query_embedding, self.fetch_k.max(k), self.min_score)
            .await?;

        let chunks: Vec<ContextChunk> = maximal_marginal_relevance(candidates, k, self.lambda)
            .into_iter()
            .map(ContextChunk::from)
            .collect();

        debug!("Retrieved {} passages", chunks.len());
        Ok(chunks)
    }

    /// Retrieve `k` passages and join their contents for a model.
    pub async fn search_documents(&self, query: &str, k: usize) -> Result<String> {
        let chunks = self.retrieve_k(query, k).await?;
        Ok(chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Format context chunks for display to the user.
pub fn format_context_for_display(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let summary = if chunk.summary.is_empty() {
                String::new()
            } else {
                format!("\n  {}", chunk.summary)
            };
            format!(
                "{} p.{} (score: {:.2}){}",
                chunk.source, chunk.page, chunk.score, summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
