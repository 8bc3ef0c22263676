//! Ingestion pipeline for finrag.
//!
//! Coordinates the whole upload path: page rendering, vision extraction,
//! chunking, embedding and indexing.

use crate::agent::{Agent, ToolContext};
use crate::chunking::{chunk_page, TextSplitter};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, GeminiEmbedder};
use crate::error::{FinragError, Result};
use crate::gemini::create_client;
use crate::ingest::{detect_image_format, DocumentKind, PdfRasterizer};
use crate::ocr::{extract_or_fallback, GeminiOcr, PageExtraction, PageExtractor};
use crate::rag::Retriever;
use crate::vector_store::{create_vector_store, Document, VectorStore};
use crate::web_search::TavilySearch;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// The ingestion pipeline.
pub struct Pipeline {
    settings: Settings,
    prompts: Prompts,
    extractor: Arc<dyn PageExtractor>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    splitter: TextSplitter,
    rasterizer: PdfRasterizer,
}

impl Pipeline {
    /// Create a pipeline with custom components.
    pub fn new(
        settings: Settings,
        extractor: Arc<dyn PageExtractor>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let splitter = TextSplitter::from_settings(&settings.chunking)?;
        let rasterizer = PdfRasterizer::new(settings.ocr.dpi, &settings.temp_dir());

        Ok(Self {
            settings,
            prompts,
            extractor,
            embedder,
            vector_store,
            splitter,
            rasterizer,
        })
    }

    /// Create a pipeline backed by Gemini and the configured vector store.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let client = create_client(&settings.gemini)?;

        let extractor = Arc::new(GeminiOcr::with_client(
            client.clone(),
            &settings.ocr.model,
            &prompts.ocr_instruction(),
            settings.ocr.temperature,
        ));
        let embedder = Arc::new(GeminiEmbedder::with_client(client, &settings.embedding));
        let vector_store = create_vector_store(&settings, embedder.dimensions()).await?;

        info!(
            "Pipeline ready (ocr: {}, embeddings: {}, store: {})",
            settings.ocr.model, settings.embedding.model, settings.vector_store.provider
        );

        Self::new(settings, extractor, embedder, vector_store)
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create a retriever over this pipeline's index.
    pub fn retriever(&self) -> Retriever {
        Retriever::from_settings(
            self.vector_store.clone(),
            self.embedder.clone(),
            &self.settings.rag,
        )
    }

    /// Create the question-answering agent.
    ///
    /// The web search tool is added when `TAVILY_API_KEY` is set.
    pub fn create_agent(&self) -> Result<Agent> {
        let client = create_client(&self.settings.gemini)?;
        let mut tools = ToolContext::new(self.retriever(), self.settings.rag.tool_k);

        if let Some(key) = self.settings.tavily_api_key() {
            tools = tools.with_web_search(Arc::new(TavilySearch::new(
                &self.settings.web_search,
                &key,
            )?));
        } else {
            info!("TAVILY_API_KEY not set, web search disabled");
        }

        let system_prompt = self.prompts.agent_system(tools.web_enabled());
        Ok(Agent::new(client, tools, &self.settings.agent, &system_prompt))
    }

    /// Extract, chunk and index an uploaded file.
    ///
    /// Pages whose extraction fails come back as the fallback placeholder and
    /// are not indexed. Indexing failures are logged and never fail the upload.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn process_upload(
        &self,
        filename: &str,
        bytes: &[u8],
        pages_to_process: Option<usize>,
    ) -> Result<UploadResult> {
        let kind = DocumentKind::from_filename(filename)?;
        info!("Processing {} upload: {}", kind, filename);

        let pages: Vec<(u32, Vec<u8>)> = match kind {
            DocumentKind::Pdf => self
                .rasterizer
                .render(bytes, pages_to_process)
                .await?
                .into_iter()
                .map(|page| (page.number, page.png))
                .collect(),
            DocumentKind::Image => {
                detect_image_format(bytes).map_err(|e| {
                    FinragError::InvalidInput(format!("Uploaded image could not be read: {}", e))
                })?;
                vec![(1, bytes.to_vec())]
            }
        };

        let extractions = self.extract_pages(pages).await;
        let chunks_indexed = self.index_extractions(filename, &extractions).await;

        Ok(UploadResult {
            filename: filename.to_string(),
            content: extractions.into_iter().map(|(_, page)| page).collect(),
            chunks_indexed,
        })
    }

    /// Extract pages concurrently, returning them in page order.
    async fn extract_pages(&self, pages: Vec<(u32, Vec<u8>)>) -> Vec<(u32, PageExtraction)> {
        let concurrency = self.settings.ocr.max_concurrent_pages.max(1);
        let total = pages.len();

        let mut results: Vec<(u32, PageExtraction)> = stream::iter(pages)
            .map(|(number, image)| {
                let extractor = self.extractor.clone();
                async move {
                    info!("Processing page {}/{}", number, total);
                    (number, extract_or_fallback(extractor.as_ref(), &image).await)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(number, _)| *number);
        results
    }

    /// Replace the source's chunks with the successfully extracted pages.
    ///
    /// Existing chunks are only removed once at least one page has been
    /// embedded, so a failing embedding service leaves the old index intact.
    async fn index_extractions(&self, source: &str, pages: &[(u32, PageExtraction)]) -> usize {
        let indexable: Vec<&(u32, PageExtraction)> =
            pages.iter().filter(|(_, page)| !page.is_fallback()).collect();

        if indexable.len() < pages.len() {
            warn!(
                "{} of {} pages could not be extracted and will not be indexed",
                pages.len() - indexable.len(),
                pages.len()
            );
        }
        if indexable.is_empty() {
            return 0;
        }

        let mut documents = Vec::new();
        for (number, page) in indexable {
            match self.embed_page(page, source, *number).await {
                Ok(docs) => documents.extend(docs),
                Err(e) => error!("Failed to embed page {} of {}: {}", number, source, e),
            }
        }
        if documents.is_empty() {
            warn!("No chunks of {} could be embedded, keeping the existing index", source);
            return 0;
        }

        match self.vector_store.delete_by_source(source).await {
            Ok(0) => {}
            Ok(removed) => info!("Replaced {} existing chunks for {}", removed, source),
            Err(e) => warn!("Failed to clear existing chunks for {}: {}", source, e),
        }

        let total = self.store_documents(&documents).await;
        info!("Indexed {} chunks for {}", total, source);
        total
    }

    /// Chunk, embed and store one extracted page. Returns the chunks stored.
    #[instrument(skip(self, extraction))]
    pub async fn index_page(
        &self,
        extraction: &PageExtraction,
        source: &str,
        page: u32,
    ) -> Result<usize> {
        let documents = self.embed_page(extraction, source, page).await?;
        Ok(self.store_documents(&documents).await)
    }

    /// Chunk and embed one extracted page without storing it.
    async fn embed_page(
        &self,
        extraction: &PageExtraction,
        source: &str,
        page: u32,
    ) -> Result<Vec<Document>> {
        let chunks = chunk_page(&self.splitter, extraction, source, page);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(FinragError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| Document::from_chunk(chunk, embedding))
            .collect())
    }

    /// Upsert documents one by one, logging and skipping rejected ones.
    async fn store_documents(&self, documents: &[Document]) -> usize {
        let mut stored = 0;
        for document in documents {
            match self.vector_store.upsert(document).await {
                Ok(()) => stored += 1,
                Err(e) => error!(
                    "Error adding chunk {} of page {} to vector store: {}",
                    document.chunk_order, document.page, e
                ),
            }
        }
        stored
    }
}

/// Result of processing an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    /// Uploaded file name.
    pub filename: String,
    /// Extraction for each processed page, in page order.
    pub content: Vec<PageExtraction>,
    /// Number of chunks indexed.
    pub chunks_indexed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoExtractor, KeywordEmbedder};
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    struct FailingStore {
        inner: MemoryVectorStore,
    }

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn upsert(&self, doc: &Document) -> Result<()> {
            if doc.chunk_order == 0 {
                return Err(FinragError::VectorStore("write rejected".to_string()));
            }
            self.inner.upsert(doc).await
        }
        async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
            self.inner.upsert_batch(docs).await
        }
        async fn search(&self, q: &[f32], limit: usize) -> Result<Vec<crate::vector_store::SearchResult>> {
            self.inner.search(q, limit).await
        }
        async fn search_with_threshold(
            &self,
            q: &[f32],
            limit: usize,
            min_score: f32,
        ) -> Result<Vec<crate::vector_store::SearchResult>> {
            self.inner.search_with_threshold(q, limit, min_score).await
        }
        async fn delete_by_source(&self, source: &str) -> Result<usize> {
            self.inner.delete_by_source(source).await
        }
        async fn list_sources(&self) -> Result<Vec<crate::vector_store::IndexedSource>> {
            self.inner.list_sources().await
        }
        async fn get_by_source(&self, source: &str) -> Result<Vec<Document>> {
            self.inner.get_by_source(source).await
        }
        async fn document_count(&self) -> Result<usize> {
            self.inner.document_count().await
        }
    }

    fn pipeline_with(
        settings: Settings,
        extractor: Arc<dyn PageExtractor>,
        store: Arc<dyn VectorStore>,
    ) -> Pipeline {
        Pipeline::new(settings, extractor, Arc::new(KeywordEmbedder), store).unwrap()
    }

    #[tokio::test]
    async fn test_image_upload_is_indexed() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline_with(Settings::default(), Arc::new(EchoExtractor::default()), store.clone());

        let result = pipeline.process_upload("scan.PNG", PNG, None).await.unwrap();
        assert_eq!(result.filename, "scan.PNG");
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.content[0].summary, "Income statement");
        assert_eq!(result.chunks_indexed, 1);

        let docs = store.get_by_source("scan.PNG").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page, 1);
        assert_eq!(docs[0].summary, "Income statement");
    }

    #[tokio::test]
    async fn test_reupload_replaces_chunks() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline_with(Settings::default(), Arc::new(EchoExtractor::default()), store.clone());

        pipeline.process_upload("scan.png", PNG, None).await.unwrap();
        pipeline.process_upload("scan.png", PNG, None).await.unwrap();
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embedding_outage_keeps_existing_index() {
        struct EmbeddingDown;

        #[async_trait]
        impl Embedder for EmbeddingDown {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(FinragError::Gemini("503".to_string()))
            }
            async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(FinragError::Gemini("503".to_string()))
            }
            fn dimensions(&self) -> usize {
                4
            }
        }

        let store = Arc::new(MemoryVectorStore::new());
        let healthy = pipeline_with(Settings::default(), Arc::new(EchoExtractor::default()), store.clone());
        healthy.process_upload("scan.png", PNG, None).await.unwrap();
        assert_eq!(store.document_count().await.unwrap(), 1);

        let degraded = Pipeline::new(
            Settings::default(),
            Arc::new(EchoExtractor::default()),
            Arc::new(EmbeddingDown),
            store.clone(),
        )
        .unwrap();
        let result = degraded.process_upload("scan.png", PNG, None).await.unwrap();
        assert_eq!(result.chunks_indexed, 0);
        assert_eq!(result.content[0].summary, "Income statement");
        assert_eq!(store.get_by_source("scan.png").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_extraction_returns_fallback() {
        struct AlwaysFails;

        #[async_trait]
        impl PageExtractor for AlwaysFails {
            async fn extract(&self, _image: &[u8]) -> Result<PageExtraction> {
                Err(FinragError::Gemini("503 overloaded".to_string()))
            }
        }

        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline_with(Settings::default(), Arc::new(AlwaysFails), store.clone());

        let result = pipeline.process_upload("scan.jpg", PNG, None).await.unwrap();
        assert_eq!(result.content, vec![PageExtraction::fallback()]);
        assert_eq!(result.chunks_indexed, 0);
        assert_eq!(store.document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_and_unreadable_files() {
        let pipeline = pipeline_with(
            Settings::default(),
            Arc::new(EchoExtractor::default()),
            Arc::new(MemoryVectorStore::new()),
        );

        assert!(matches!(
            pipeline.process_upload("notes.docx", b"PK", None).await,
            Err(FinragError::UnsupportedFile(_))
        ));
        assert!(matches!(
            pipeline.process_upload("fake.png", b"plain text", None).await,
            Err(FinragError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_pages_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.temp_dir = dir.path().to_string_lossy().to_string();
        let extractor = Arc::new(EchoExtractor::default());
        let pipeline = pipeline_with(settings, extractor.clone(), Arc::new(MemoryVectorStore::new()));

        let result = pipeline.process_upload("report.pdf", b"%PDF-1.4", Some(0)).await.unwrap();
        assert!(result.content.is_empty());
        assert_eq!(result.chunks_indexed, 0);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_index_page_skips_failed_upserts() {
        let mut settings = Settings::default();
        settings.chunking.chunk_size = 20;
        settings.chunking.chunk_overlap = 0;
        let store = Arc::new(FailingStore { inner: MemoryVectorStore::new() });
        let pipeline = pipeline_with(settings, Arc::new(EchoExtractor::default()), store.clone());

        let page = PageExtraction::new("Total income rose\n\nNet profit fell", "Highlights");
        let stored = pipeline.index_page(&page, "q1.pdf", 2).await.unwrap();
        assert_eq!(stored, 1);

        let docs = store.get_by_source("q1.pdf").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Net profit fell");
    }

    #[tokio::test]
    async fn test_extract_pages_keeps_page_order() {
        let mut settings = Settings::default();
        settings.ocr.max_concurrent_pages = 4;
        let pipeline = pipeline_with(
            settings,
            Arc::new(EchoExtractor::default()),
            Arc::new(MemoryVectorStore::new()),
        );

        let pages = vec![(3, vec![0; 3]), (1, vec![0; 1]), (2, b"FAIL".to_vec())];
        let results = pipeline.extract_pages(pages).await;
        let numbers: Vec<_> = results.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(results[1].1.is_fallback());
        assert!(results[2].1.text.contains("3 bytes"));
    }
}
