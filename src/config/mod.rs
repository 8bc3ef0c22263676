//! Configuration module for finrag.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, OcrPrompts, Prompts};
pub use settings::{
    AgentSettings, ChunkingSettings, EmbeddingSettings, GeminiSettings, GeneralSettings,
    OcrSettings, PromptSettings, RagSettings, ServerSettings, Settings, VectorStoreProvider,
    VectorStoreSettings, WebSearchSettings,
};
