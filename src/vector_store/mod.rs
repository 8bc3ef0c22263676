//! Vector store abstraction for finrag.
//!
//! Provides a trait-based interface for different vector database backends,
//! plus the maximal marginal relevance re-ranking used at query time.

mod memory;
mod qdrant;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use qdrant::QdrantVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::ContentChunk;
use crate::config::{Settings, VectorStoreProvider};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A chunk stored in the vector database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// File name of the uploaded document.
    pub source: String,
    /// 1-based page number within the source.
    pub page: u32,
    /// Order of this chunk within its page.
    pub chunk_order: u32,
    /// Text content of this chunk.
    pub content: String,
    /// Summary of the page the chunk came from.
    pub summary: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document with a fresh ID.
    pub fn new(
        source: String,
        page: u32,
        chunk_order: u32,
        content: String,
        summary: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            page,
            chunk_order,
            content,
            summary,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Create a document from a chunk and its embedding.
    pub fn from_chunk(chunk: ContentChunk, embedding: Vec<f32>) -> Self {
        Self::new(
            chunk.source,
            chunk.page,
            chunk.order,
            chunk.content,
            chunk.summary,
            embedding,
        )
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity to the query (higher is better).
    pub score: f32,
}

/// Summary information about an indexed source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSource {
    /// File name of the uploaded document.
    pub source: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// Number of distinct pages with at least one chunk.
    pub page_count: u32,
    /// Most recent indexing time.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a document with its embedding.
    async fn upsert(&self, doc: &Document) -> Result<()>;

    /// Bulk upsert documents.
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// Search for similar documents.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Search with a minimum similarity threshold.
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// Fetch `fetch_k` nearest documents and re-rank them for diversity.
    async fn search_mmr(
        &self,
        query_embedding: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<SearchResult>> {
        let candidates = self.search(query_embedding, fetch_k.max(k)).await?;
        Ok(maximal_marginal_relevance(candidates, k, lambda))
    }

    /// Delete all chunks of a source document.
    async fn delete_by_source(&self, source: &str) -> Result<usize>;

    /// List all indexed source documents, most recently indexed first.
    async fn list_sources(&self) -> Result<Vec<IndexedSource>>;

    /// Get a specific source's information.
    async fn get_source(&self, source: &str) -> Result<Option<IndexedSource>> {
        let sources = self.list_sources().await?;
        Ok(sources.into_iter().find(|s| s.source == source))
    }

    /// Get all chunks of a source, ordered by page then chunk order.
    async fn get_by_source(&self, source: &str) -> Result<Vec<Document>>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;

    /// Make sure the backing collection exists and is reachable.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }
}

/// Create the vector store selected in settings.
pub async fn create_vector_store(
    settings: &Settings,
    dimensions: usize,
) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        VectorStoreProvider::Qdrant => Arc::new(QdrantVectorStore::new(
            &settings.qdrant_url(),
            settings.qdrant_api_key(),
            &settings.vector_store.collection,
            dimensions,
            settings.vector_store.create_collection,
        )?),
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
        VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
    };
    store.ensure_ready().await?;
    Ok(store)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Select `k` results balancing query relevance against redundancy.
///
/// `score` on each candidate is taken as its similarity to the query. The
/// first pick is the most relevant candidate; each later pick maximises
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
pub fn maximal_marginal_relevance(
    candidates: Vec<SearchResult>,
    k: usize,
    lambda: f32,
) -> Vec<SearchResult> {
    let mut remaining = candidates;
    let mut selected: Vec<SearchResult> = Vec::with_capacity(k.min(remaining.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, candidate) in remaining.iter().enumerate() {
            let score = if selected.is_empty() {
                candidate.score
            } else {
                let redundancy = selected
                    .iter()
                    .map(|s| cosine_similarity(&candidate.document.embedding, &s.document.embedding))
                    .fold(f32::NEG_INFINITY, f32::max);
                lambda * candidate.score - (1.0 - lambda) * redundancy
            };

            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        selected.push(remaining.remove(best_idx));
    }

    selected
}

/// Aggregate per-chunk metadata into per-source summaries.
pub(crate) fn tally_sources<'a>(
    chunks: impl IntoIterator<Item = (&'a str, u32, DateTime<Utc>)>,
) -> Vec<IndexedSource> {
    let mut tallies: HashMap<&str, (u32, HashSet<u32>, DateTime<Utc>)> = HashMap::new();

    for (source, page, indexed_at) in chunks {
        let entry = tallies
            .entry(source)
            .or_insert_with(|| (0, HashSet::new(), indexed_at));
        entry.0 += 1;
        entry.1.insert(page);
        if indexed_at > entry.2 {
            entry.2 = indexed_at;
        }
    }

    let mut sources: Vec<IndexedSource> = tallies
        .into_iter()
        .map(|(source, (chunk_count, pages, indexed_at))| IndexedSource {
            source: source.to_string(),
            chunk_count,
            page_count: pages.len() as u32,
            indexed_at,
        })
        .collect();
    sources.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then_with(|| a.source.cmp(&b.source)));
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn result(content: &str, embedding: Vec<f32>, query: &[f32]) -> SearchResult {
        let score = cosine_similarity(query, &embedding);
        SearchResult {
            document: Document::new(
                "report.pdf".to_string(),
                1,
                0,
                content.to_string(),
                String::new(),
                embedding,
            ),
            score,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_mmr_prefers_diverse_results() {
        let query = [1.0, 0.0];
        let candidates = vec![
            result("a", vec![0.9, 0.436], &query),
            result("a-duplicate", vec![0.89, 0.456], &query),
            result("c", vec![0.8, -0.6], &query),
        ];

        let picked = maximal_marginal_relevance(candidates, 2, 0.5);
        let contents: Vec<_> = picked.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "c"]);
    }

    #[test]
    fn test_mmr_with_lambda_one_is_relevance_order() {
        let query = [1.0, 0.0];
        let candidates = vec![
            result("c", vec![0.8, -0.6], &query),
            result("a", vec![0.9, 0.436], &query),
            result("a-duplicate", vec![0.89, 0.456], &query),
        ];

        let picked = maximal_marginal_relevance(candidates, 3, 1.0);
        let contents: Vec<_> = picked.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "a-duplicate", "c"]);
    }

    #[test]
    fn test_mmr_bounds() {
        let query = [1.0, 0.0];
        let candidates = vec![result("only", vec![1.0, 0.0], &query)];
        assert!(maximal_marginal_relevance(candidates.clone(), 0, 0.5).is_empty());
        assert_eq!(maximal_marginal_relevance(candidates, 6, 0.5).len(), 1);
        assert!(maximal_marginal_relevance(Vec::new(), 6, 0.5).is_empty());
    }

    #[test]
    fn test_tally_sources() {
        let earlier = Utc::now() - Duration::hours(1);
        let later = Utc::now();
        let sources = tally_sources(vec![
            ("q1.pdf", 1, earlier),
            ("q1.pdf", 1, earlier),
            ("q1.pdf", 2, earlier),
            ("q2.pdf", 1, later),
        ]);

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source, "q2.pdf");
        assert_eq!(sources[1].chunk_count, 3);
        assert_eq!(sources[1].page_count, 2);
    }
}
