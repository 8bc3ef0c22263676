//! Retrieval over the indexed financial documents.
//!
//! Queries are embedded and matched against the vector store, then
//! re-ranked with maximal marginal relevance so the returned passages
//! cover different parts of the documents.

pub mod context;

pub use context::{format_context_for_display, Retriever};

use crate::vector_store::SearchResult;
use serde::{Deserialize, Serialize};

/// A retrieved passage with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextChunk {
    /// File name of the source document.
    pub source: String,
    /// 1-based page number.
    pub page: u32,
    /// Summary of the page.
    pub summary: String,
    /// Text content.
    pub content: String,
    /// Similarity score.
    pub score: f32,
}

impl From<SearchResult> for ContextChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            source: result.document.source,
            page: result.document.page,
            summary: result.document.summary,
            content: result.document.content,
            score: result.score,
        }
    }
}
