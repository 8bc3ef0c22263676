//! Error types for finrag.

use thiserror::Error;

/// Library-level error type for finrag operations.
#[derive(Error, Debug)]
pub enum FinragError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("PDF rendering failed: {0}")]
    PdfRender(String),

    #[error("OCR extraction failed: {0}")]
    Ocr(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Web search error: {0}")]
    WebSearch(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Gemini API error: {0}")]
    Gemini(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Document not found: {0}")]
    SourceNotFound(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for finrag operations.
pub type Result<T> = std::result::Result<T, FinragError>;
