//! Splitting extracted pages into searchable chunks.
//!
//! Each page is split independently so a chunk never spans two pages, and
//! every chunk carries the page summary produced during extraction.

mod recursive;

pub use recursive::TextSplitter;

use crate::ocr::PageExtraction;
use serde::{Deserialize, Serialize};

/// A chunk of text from one document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Text content of this chunk.
    pub content: String,
    /// Summary of the page the chunk came from.
    pub summary: String,
    /// Uploaded file name.
    pub source: String,
    /// 1-based page number.
    pub page: u32,
    /// Order of this chunk within its page.
    pub order: u32,
}

/// Split one extracted page into chunks.
pub fn chunk_page(
    splitter: &TextSplitter,
    extraction: &PageExtraction,
    source: &str,
    page: u32,
) -> Vec<ContentChunk> {
    splitter
        .split_text(&extraction.text)
        .into_iter()
        .enumerate()
        .map(|(i, content)| ContentChunk {
            content,
            summary: extraction.summary.clone(),
            source: source.to_string(),
            page,
            order: i as u32,
        })
        .collect()
}
