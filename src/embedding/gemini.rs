//! Gemini embeddings through the OpenAI-compatible endpoint.

use super::Embedder;
use crate::config::{EmbeddingSettings, GeminiSettings};
use crate::error::{FinragError, Result};
use crate::gemini::{create_client, GeminiClient};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Maximum number of texts sent in one embeddings request.
const BATCH_SIZE: usize = 100;

/// Gemini-based embedder.
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
    dimensions: usize,
    request_dimensions: bool,
}

impl GeminiEmbedder {
    /// Create an embedder from settings.
    pub fn new(gemini: &GeminiSettings, embedding: &EmbeddingSettings) -> Result<Self> {
        Ok(Self::with_client(create_client(gemini)?, embedding))
    }

    /// Create an embedder around an existing client.
    pub fn with_client(client: GeminiClient, embedding: &EmbeddingSettings) -> Self {
        Self {
            client,
            model: embedding.model.clone(),
            dimensions: embedding.dimensions as usize,
            request_dimensions: embedding.request_dimensions,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| FinragError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let mut args = CreateEmbeddingRequestArgs::default();
            args.model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()));
            // text-embedding-004 rejects the parameter unless it is asked for
            if self.request_dimensions {
                args.dimensions(self.dimensions as u32);
            }
            let request = args
                .build()
                .map_err(|e| FinragError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| FinragError::Gemini(format!("Embedding API error: {}", e)))?;

            if response.data.len() != chunk.len() {
                return Err(FinragError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    chunk.len(),
                    response.data.len()
                )));
            }

            let mut embeddings = response.data;
            embeddings.sort_by_key(|e| e.index);
            all_embeddings.extend(embeddings.into_iter().map(|e| e.embedding));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::create_client_with_key;

    fn embedder(settings: &EmbeddingSettings) -> GeminiEmbedder {
        let client = create_client_with_key(&GeminiSettings::default(), "test-key").unwrap();
        GeminiEmbedder::with_client(client, settings)
    }

    #[test]
    fn test_embedder_creation() {
        let embedder = embedder(&EmbeddingSettings::default());
        assert_eq!(embedder.dimensions(), 768);
        assert_eq!(embedder.model(), "text-embedding-004");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = embedder(&EmbeddingSettings::default());
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
