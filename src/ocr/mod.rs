//! Page transcription with a hosted vision model.
//!
//! Each page image is sent to the model with an instruction to return every
//! piece of text on the page plus a one-line summary, as JSON.

mod vision;

pub use vision::GeminiOcr;

use crate::error::{FinragError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Text returned when a page could not be transcribed.
pub const FALLBACK_TEXT: &str = "ERROR PROCESSING THE PAGE";
/// Summary returned when a page could not be transcribed.
pub const FALLBACK_SUMMARY: &str = "NULL";

/// Text and summary extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    /// Full transcription of the page.
    pub text: String,
    /// Short description used as chunk metadata.
    #[serde(default)]
    pub summary: String,
}

impl PageExtraction {
    pub fn new(text: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            summary: summary.into(),
        }
    }

    /// Placeholder for a page whose extraction failed.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_TEXT, FALLBACK_SUMMARY)
    }

    /// Whether this is the failure placeholder.
    pub fn is_fallback(&self) -> bool {
        self.text == FALLBACK_TEXT && self.summary == FALLBACK_SUMMARY
    }
}

/// Trait for page extraction implementations.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Transcribe one page image (PNG, JPEG, GIF or BMP bytes).
    async fn extract(&self, image: &[u8]) -> Result<PageExtraction>;
}

/// Run an extraction, logging failures and substituting the fallback page.
pub async fn extract_or_fallback(extractor: &dyn PageExtractor, image: &[u8]) -> PageExtraction {
    match extractor.extract(image).await {
        Ok(extraction) => extraction,
        Err(e) => {
            error!("An error occurred during document processing: {}", e);
            PageExtraction::fallback()
        }
    }
}

/// Parse the model's JSON answer, tolerating code fences and surrounding prose.
pub fn parse_extraction(response: &str) -> Result<PageExtraction> {
    let json_start = response.find('{');
    let json_end = response.rfind('}');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    serde_json::from_str(json_str).map_err(|e| {
        FinragError::Ocr(format!(
            "Failed to parse extraction response: {}. Response was: {}",
            e,
            truncate_chars(response, 300)
        ))
    })
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingExtractor;

    #[async_trait]
    impl PageExtractor for FailingExtractor {
        async fn extract(&self, _image: &[u8]) -> Result<PageExtraction> {
            Err(FinragError::Gemini("quota exceeded".to_string()))
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let page = parse_extraction(r#"{"text": "Revenue: 1,200 Cr", "summary": "Q1 revenue"}"#).unwrap();
        assert_eq!(page.text, "Revenue: 1,200 Cr");
        assert_eq!(page.summary, "Q1 revenue");
    }

    #[test]
    fn test_parse_fenced_json() {
        let response = "```json\n{\"text\": \"Balance sheet\\n| Assets | 10 |\", \"summary\": \"Balance sheet\"}\n```";
        let page = parse_extraction(response).unwrap();
        assert!(page.text.contains("| Assets | 10 |"));
    }

    #[test]
    fn test_parse_missing_summary_defaults_empty() {
        let page = parse_extraction(r#"{"text": "Notes to accounts"}"#).unwrap();
        assert_eq!(page.summary, "");
    }

    #[test]
    fn test_parse_missing_text_fails() {
        assert!(matches!(
            parse_extraction(r#"{"summary": "only a summary"}"#),
            Err(FinragError::Ocr(_))
        ));
        assert!(parse_extraction("the model refused").is_err());
    }

    #[test]
    fn test_fallback_marker() {
        assert!(PageExtraction::fallback().is_fallback());
        assert!(!PageExtraction::new(FALLBACK_TEXT, "real summary").is_fallback());
    }

    #[tokio::test]
    async fn test_extract_or_fallback_swallows_errors() {
        let page = extract_or_fallback(&FailingExtractor, b"bytes").await;
        assert_eq!(page, PageExtraction::fallback());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
