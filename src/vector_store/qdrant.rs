//! Qdrant vector store over the REST API.
//!
//! Points use the LangChain payload layout (`page_content` plus a `metadata`
//! object), so collections written by other LangChain-based tools can be
//! queried and listed here too.

use super::{tally_sources, Document, IndexedSource, SearchResult, VectorStore};
use crate::error::{FinragError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Page size used when scrolling through a collection.
const SCROLL_LIMIT: usize = 256;

/// Qdrant-backed vector store.
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dimensions: usize,
    create_collection: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    #[serde(default)]
    page_content: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Metadata {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    chunk_order: u32,
    #[serde(default)]
    indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct Point {
    id: Value,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScrollPage {
    points: Vec<Point>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantVectorStore {
    /// Create a client for `collection` on the Qdrant instance at `url`.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimensions: usize,
        create_collection: bool,
    ) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| FinragError::Config(format!("Invalid Qdrant URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FinragError::Config(format!(
                "Qdrant URL must use http or https: {}",
                url
            )));
        }
        if collection.trim().is_empty() {
            return Err(FinragError::Config("Qdrant collection name is empty".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            collection: collection.to_string(),
            dimensions,
            create_collection,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self, path: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FinragError::VectorStore(format!(
                "Qdrant returned {}: {}",
                status, body
            )));
        }
        let parsed: QdrantResponse<T> = response.json().await?;
        Ok(parsed.result)
    }

    fn source_filter(source: &str) -> Value {
        json!({ "must": [{ "key": "metadata.source", "match": { "value": source } }] })
    }

    fn point_body(doc: &Document) -> Value {
        let payload = Payload {
            page_content: doc.content.clone(),
            metadata: Metadata {
                summary: doc.summary.clone(),
                source: doc.source.clone(),
                page: doc.page,
                chunk_order: doc.chunk_order,
                indexed_at: Some(doc.indexed_at),
            },
        };
        json!({
            "id": doc.id.to_string(),
            "vector": doc.embedding,
            "payload": payload,
        })
    }

    async fn scroll(&self, filter: Option<Value>, with_vector: bool) -> Result<Vec<Point>> {
        let mut points = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_LIMIT,
                "with_payload": true,
                "with_vector": with_vector,
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(offset) = offset.take() {
                body["offset"] = offset;
            }

            let page: ScrollPage = self
                .send(
                    self.request(Method::POST, self.collection_url("/points/scroll"))
                        .json(&body),
                )
                .await?;
            points.extend(page.points);

            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(points)
    }

    async fn count(&self, filter: Option<Value>) -> Result<usize> {
        let mut body = json!({ "exact": true });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }
        let result: CountResult = self
            .send(
                self.request(Method::POST, self.collection_url("/points/count"))
                    .json(&body),
            )
            .await?;
        Ok(result.count)
    }
}

/// Convert a Qdrant point ID (UUID string or unsigned integer) to a UUID.
fn point_id(id: &Value) -> Uuid {
    match id {
        Value::String(s) => Uuid::parse_str(s).unwrap_or_default(),
        Value::Number(n) => n.as_u64().map(|n| Uuid::from_u128(n as u128)).unwrap_or_default(),
        _ => Uuid::nil(),
    }
}

/// Read a point's vector, accepting a plain array or a single named vector.
fn vector_from_value(value: Option<Value>) -> Vec<f32> {
    let parse = |v: Value| serde_json::from_value::<Vec<f32>>(v).unwrap_or_default();
    match value {
        Some(Value::Array(items)) => parse(Value::Array(items)),
        Some(Value::Object(map)) => map.into_iter().next().map(|(_, v)| parse(v)).unwrap_or_default(),
        _ => Vec::new(),
    }
}

impl From<Point> for SearchResult {
    fn from(point: Point) -> Self {
        let payload = point.payload.unwrap_or(Payload {
            page_content: String::new(),
            metadata: Metadata::default(),
        });
        SearchResult {
            document: Document {
                id: point_id(&point.id),
                source: payload.metadata.source,
                page: payload.metadata.page,
                chunk_order: payload.metadata.chunk_order,
                content: payload.page_content,
                summary: payload.metadata.summary,
                embedding: vector_from_value(point.vector),
                indexed_at: payload.metadata.indexed_at.unwrap_or_else(Utc::now),
            },
            score: point.score,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    #[instrument(skip(self, doc))]
    async fn upsert(&self, doc: &Document) -> Result<()> {
        self.upsert_batch(std::slice::from_ref(doc)).await?;
        debug!("Upserted document {}", doc.id);
        Ok(())
    }

    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let points: Vec<Value> = docs.iter().map(Self::point_body).collect();
        let _: Value = self
            .send(
                self.request(Method::PUT, self.collection_url("/points?wait=true"))
                    .json(&json!({ "points": points })),
            )
            .await?;

        info!("Batch upserted {} documents", docs.len());
        Ok(docs.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query_embedding, limit, f32::NEG_INFINITY)
            .await
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut body = json!({
            "vector": query_embedding,
            "limit": limit,
            "with_payload": true,
            "with_vector": true,
        });
        if min_score.is_finite() {
            body["score_threshold"] = json!(min_score);
        }

        let points: Vec<Point> = self
            .send(
                self.request(Method::POST, self.collection_url("/points/search"))
                    .json(&body),
            )
            .await?;

        let results: Vec<SearchResult> = points.into_iter().map(SearchResult::from).collect();
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let filter = Self::source_filter(source);
        let matching = self.count(Some(filter.clone())).await?;
        if matching == 0 {
            return Ok(0);
        }

        let _: Value = self
            .send(
                self.request(Method::POST, self.collection_url("/points/delete?wait=true"))
                    .json(&json!({ "filter": filter })),
            )
            .await?;

        info!("Deleted {} documents for source {}", matching, source);
        Ok(matching)
    }

    #[instrument(skip(self))]
    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let points = self.scroll(None, false).await?;
        let metadata: Vec<Metadata> = points
            .into_iter()
            .filter_map(|p| p.payload.map(|payload| payload.metadata))
            .filter(|m| !m.source.is_empty())
            .collect();

        Ok(tally_sources(metadata.iter().map(|m| {
            (
                m.source.as_str(),
                m.page,
                m.indexed_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
            )
        })))
    }

    #[instrument(skip(self))]
    async fn get_by_source(&self, source: &str) -> Result<Vec<Document>> {
        let points = self.scroll(Some(Self::source_filter(source)), true).await?;
        let mut docs: Vec<Document> = points
            .into_iter()
            .map(|p| SearchResult::from(p).document)
            .collect();
        docs.sort_by_key(|d| (d.page, d.chunk_order));
        Ok(docs)
    }

    async fn document_count(&self) -> Result<usize> {
        self.count(None).await
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn ensure_ready(&self) -> Result<()> {
        let response = self
            .request(Method::GET, self.collection_url(""))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                debug!("Collection {} exists", self.collection);
                Ok(())
            }
            StatusCode::NOT_FOUND if self.create_collection => {
                warn!("Collection {} not found, creating it", self.collection);
                let _: Value = self
                    .send(
                        self.request(Method::PUT, self.collection_url(""))
                            .json(&json!({
                                "vectors": { "size": self.dimensions, "distance": "Cosine" }
                            })),
                    )
                    .await?;
                info!(
                    "Created collection {} ({} dimensions)",
                    self.collection, self.dimensions
                );
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(FinragError::VectorStore(format!(
                "Collection {} does not exist",
                self.collection
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(FinragError::VectorStore(format!(
                    "Qdrant returned {}: {}",
                    status, body
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockQdrant {
        created: Mutex<Option<Value>>,
        upserted: Mutex<Vec<Value>>,
    }

    async fn get_collection(
        State(mock): State<Arc<MockQdrant>>,
        Path(name): Path<String>,
    ) -> (AxumStatus, Json<Value>) {
        if name == "existing" || mock.created.lock().unwrap().is_some() {
            (AxumStatus::OK, Json(json!({ "result": { "status": "green" } })))
        } else {
            (AxumStatus::NOT_FOUND, Json(json!({ "status": { "error": "Not found" } })))
        }
    }

    async fn create_collection(
        State(mock): State<Arc<MockQdrant>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        *mock.created.lock().unwrap() = Some(body);
        Json(json!({ "result": true }))
    }

    async fn upsert_points(
        State(mock): State<Arc<MockQdrant>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        mock.upserted.lock().unwrap().push(body);
        Json(json!({ "result": { "operation_id": 1, "status": "completed" } }))
    }

    async fn search_points() -> Json<Value> {
        Json(json!({
            "result": [{
                "id": "3f2b8c1e-8d4a-4b8e-9c1a-2f6e5d4c3b2a",
                "score": 0.92,
                "payload": {
                    "page_content": "Total income 1,250 Cr",
                    "metadata": { "summary": "Income statement", "source": "q1.pdf", "page": 4 }
                },
                "vector": [0.1, 0.2]
            }, {
                "id": 7,
                "score": 0.5,
                "payload": { "page_content": "legacy", "metadata": { "summary": "old" } },
                "vector": { "": [0.3, 0.4] }
            }]
        }))
    }

    async fn serve(mock: Arc<MockQdrant>) -> String {
        let app = Router::new()
            .route("/collections/{name}", get(get_collection).put(create_collection))
            .route("/collections/{name}/points", axum::routing::put(upsert_points))
            .route("/collections/{name}/points/search", post(search_points))
            .with_state(mock);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(matches!(
            QdrantVectorStore::new("not a url", None, "c", 768, true),
            Err(FinragError::Config(_))
        ));
        assert!(QdrantVectorStore::new("ftp://host", None, "c", 768, true).is_err());
        assert!(QdrantVectorStore::new("http://localhost:6333", None, " ", 768, true).is_err());
    }

    #[test]
    fn test_point_body_uses_langchain_layout() {
        let doc = Document::new(
            "q1.pdf".to_string(),
            2,
            1,
            "Net worth".to_string(),
            "Balance sheet".to_string(),
            vec![0.5, 0.5],
        );
        let body = QdrantVectorStore::point_body(&doc);
        assert_eq!(body["id"], json!(doc.id.to_string()));
        assert_eq!(body["payload"]["page_content"], "Net worth");
        assert_eq!(body["payload"]["metadata"]["source"], "q1.pdf");
        assert_eq!(body["payload"]["metadata"]["summary"], "Balance sheet");
        assert_eq!(body["payload"]["metadata"]["page"], 2);
    }

    #[test]
    fn test_point_ids() {
        let id = Uuid::new_v4();
        assert_eq!(point_id(&json!(id.to_string())), id);
        assert_eq!(point_id(&json!(42)), Uuid::from_u128(42));
        assert_eq!(point_id(&Value::Null), Uuid::nil());
    }

    #[tokio::test]
    async fn test_ensure_ready_creates_missing_collection() {
        let mock = Arc::new(MockQdrant::default());
        let url = serve(mock.clone()).await;

        let store = QdrantVectorStore::new(&url, Some("secret".into()), "fresh", 768, true).unwrap();
        store.ensure_ready().await.unwrap();

        let created = mock.created.lock().unwrap().clone().unwrap();
        assert_eq!(created["vectors"]["size"], 768);
        assert_eq!(created["vectors"]["distance"], "Cosine");
    }

    #[tokio::test]
    async fn test_ensure_ready_without_create_fails() {
        let mock = Arc::new(MockQdrant::default());
        let url = serve(mock.clone()).await;

        let missing = QdrantVectorStore::new(&url, None, "fresh", 768, false).unwrap();
        assert!(matches!(missing.ensure_ready().await, Err(FinragError::VectorStore(_))));

        let existing = QdrantVectorStore::new(&url, None, "existing", 768, false).unwrap();
        assert!(existing.ensure_ready().await.is_ok());
    }

    #[tokio::test]
    async fn test_upsert_and_search() {
        let mock = Arc::new(MockQdrant::default());
        let url = serve(mock.clone()).await;
        let store = QdrantVectorStore::new(&url, None, "existing", 2, true).unwrap();

        let doc = Document::new(
            "q1.pdf".to_string(),
            4,
            0,
            "Total income 1,250 Cr".to_string(),
            "Income statement".to_string(),
            vec![0.1, 0.2],
        );
        assert_eq!(store.upsert_batch(&[doc]).await.unwrap(), 1);
        assert_eq!(store.upsert_batch(&[]).await.unwrap(), 0);
        assert_eq!(mock.upserted.lock().unwrap().len(), 1);

        let results = store.search(&[0.1, 0.2], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.source, "q1.pdf");
        assert_eq!(results[0].document.page, 4);
        assert_eq!(results[0].document.embedding, vec![0.1, 0.2]);
        assert_eq!(results[1].document.content, "legacy");
        assert_eq!(results[1].document.embedding, vec![0.3, 0.4]);
    }
}
