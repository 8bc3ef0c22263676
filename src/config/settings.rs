//! Configuration settings for finrag.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub gemini: GeminiSettings,
    pub ocr: OcrSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub vector_store: VectorStoreSettings,
    pub rag: RagSettings,
    pub agent: AgentSettings,
    pub web_search: WebSearchSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (rendered PDF pages).
    pub temp_dir: String,
    /// Log level without -v flags (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.finrag".to_string(),
            temp_dir: "/tmp/finrag".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Connection settings for the Gemini OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            timeout_seconds: 300,
        }
    }
}

/// Vision OCR settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Vision model used to transcribe page images.
    pub model: String,
    /// Resolution used when rendering PDF pages.
    pub dpi: u32,
    /// Maximum pages sent to the vision model at once.
    pub max_concurrent_pages: usize,
    /// Sampling temperature for extraction.
    pub temperature: f32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-lite".to_string(),
            dpi: 150,
            max_concurrent_pages: 2,
            temperature: 0.0,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Send `dimensions` with each request (only some models accept it).
    pub request_dimensions: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            request_dimensions: false,
        }
    }
}

/// Text splitting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Separators tried in order; an empty string splits into characters.
    pub separators: Vec<String>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 3000,
            chunk_overlap: 100,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Qdrant over its REST API (default).
    #[default]
    Qdrant,
    /// Local SQLite file.
    Sqlite,
    /// Process memory, lost on exit.
    Memory,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(VectorStoreProvider::Qdrant),
            "sqlite" => Ok(VectorStoreProvider::Sqlite),
            "memory" => Ok(VectorStoreProvider::Memory),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Qdrant => write!(f, "qdrant"),
            VectorStoreProvider::Sqlite => write!(f, "sqlite"),
            VectorStoreProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Backend to use.
    pub provider: VectorStoreProvider,
    /// Qdrant URL. `QDRANT_URL` in the environment takes precedence.
    pub qdrant_url: String,
    /// Collection holding the document chunks.
    pub collection: String,
    /// Create the collection when it does not exist yet.
    pub create_collection: bool,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Qdrant,
            qdrant_url: "http://localhost:6333".to_string(),
            collection: "BAJAJ_FINANCIAL_REPORT_TEST".to_string(),
            create_collection: true,
            sqlite_path: "~/.finrag/vectors.db".to_string(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Chunks returned by a retrieval.
    pub k: usize,
    /// Chunks returned to the agent by the search tool.
    pub tool_k: usize,
    /// Candidates fetched before MMR re-ranking.
    pub fetch_k: usize,
    /// MMR trade-off between relevance (1.0) and diversity (0.0).
    pub lambda: f32,
    /// Minimum cosine similarity for a chunk to be used (-1.0 keeps everything).
    pub min_score: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            k: 6,
            tool_k: 2,
            fetch_k: 20,
            lambda: 0.5,
            min_score: -1.0,
        }
    }
}

/// Agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Chat model driving the agent.
    pub model: String,
    /// Maximum model calls per question.
    pub max_iterations: usize,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_iterations: 10,
            temperature: 0.2,
        }
    }
}

/// Web search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchSettings {
    /// Offer the web search tool when `TAVILY_API_KEY` is set.
    pub enabled: bool,
    /// Search API base URL.
    pub api_base: String,
    /// Upper bound on results per search, whatever the model asks for.
    pub max_results: u32,
    /// Tavily search depth (basic, advanced).
    pub search_depth: String,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.tavily.com".to_string(),
            max_results: 10,
            search_depth: "basic".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Hosted frontend domain. `VERCEL` in the environment takes precedence.
    pub frontend_host: String,
    /// Additional allowed CORS origins.
    pub extra_origins: Vec<String>,
    /// Maximum upload size in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            frontend_host: "bajaj-finserv-assingment.vercel.app".to_string(),
            extra_origins: Vec::new(),
            max_upload_mb: 50,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

/// Read the first non-empty environment variable among `names`.
fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::FinragError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finrag")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Qdrant URL, from the environment or the config file.
    ///
    /// `QUADRANT_API_KEY_LOCATION` is the name older deployments used.
    pub fn qdrant_url(&self) -> String {
        env_any(&["QDRANT_URL", "QUADRANT_API_KEY_LOCATION"])
            .unwrap_or_else(|| self.vector_store.qdrant_url.clone())
    }

    /// Qdrant API key, if one is configured.
    pub fn qdrant_api_key(&self) -> Option<String> {
        env_any(&["QDRANT_API_KEY", "QUADRANT_API_KEY"])
    }

    /// Tavily API key, if web search is enabled and a key is set.
    pub fn tavily_api_key(&self) -> Option<String> {
        if !self.web_search.enabled {
            return None;
        }
        env_any(&["TAVILY_API_KEY"])
    }

    /// Hosted frontend domain used for CORS.
    pub fn frontend_host(&self) -> String {
        env_any(&["VERCEL"]).unwrap_or_else(|| self.server.frontend_host.clone())
    }
}
