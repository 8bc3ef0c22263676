//! Fakes shared by unit tests.

use crate::embedding::Embedder;
use crate::error::{FinragError, Result};
use crate::ocr::{PageExtraction, PageExtractor};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic embedder: counts a few financial keywords.
pub struct KeywordEmbedder;

const KEYWORDS: [&str; 3] = ["income", "profit", "director"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect();
        // keeps unmatched text off the zero vector
        vector.push(0.1);
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }
}

/// Extractor that echoes the image size, failing on images that start with `FAIL`.
#[derive(Default)]
pub struct EchoExtractor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PageExtractor for EchoExtractor {
    async fn extract(&self, image: &[u8]) -> Result<PageExtraction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.starts_with(b"FAIL") {
            return Err(FinragError::Ocr("unreadable page".to_string()));
        }
        Ok(PageExtraction::new(
            format!("Total income for the page is {} bytes", image.len()),
            "Income statement",
        ))
    }
}
