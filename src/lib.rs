//! finrag - question answering over financial reports
//!
//! Upload PDF or image reports, extract their pages with a vision model and
//! answer questions about them with a tool-using agent.
//!
//! # Overview
//!
//! finrag allows you to:
//! - Render PDFs to page images and transcribe them with Gemini vision
//! - Split page text into overlapping chunks and index their embeddings
//! - Retrieve diverse passages with maximal marginal relevance
//! - Answer questions through an agent that can also search the web
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Settings and prompt templates
//! - `gemini` - Client for the hosted Gemini models
//! - `ingest` - Upload classification and PDF rendering
//! - `ocr` - Page text and summary extraction
//! - `chunking` - Recursive character text splitting
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction (Qdrant, SQLite, memory)
//! - `rag` - Retrieval and context formatting
//! - `web_search` - Tavily web search
//! - `agent` - Tool-calling question answering loop
//! - `orchestrator` - Upload pipeline coordination
//! - `server` - HTTP API
//!
//! # Example
//!
//! ```rust,no_run
//! use finrag::config::Settings;
//! use finrag::orchestrator::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::from_settings(settings).await?;
//!
//!     let bytes = std::fs::read("q3-results.pdf")?;
//!     let result = pipeline.process_upload("q3-results.pdf", &bytes, Some(5)).await?;
//!     println!("Indexed {} chunks", result.chunks_indexed);
//!
//!     let answer = pipeline.create_agent()?.run("What was the total income?").await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod ingest;
pub mod ocr;
pub mod orchestrator;
pub mod rag;
pub mod server;
pub mod vector_store;
pub mod web_search;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{FinragError, Result};
