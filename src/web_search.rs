//! Web search for questions the indexed documents cannot answer.

use crate::config::WebSearchSettings;
use crate::error::{FinragError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    /// Extracted snippet of the page.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f32,
}

/// Trait for web search providers.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Search the web, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<WebResult>>;
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<WebResult>,
}

/// Tavily search API client.
pub struct TavilySearch {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    search_depth: String,
    max_results: u32,
}

impl TavilySearch {
    /// Create a client from settings and an API key.
    pub fn new(settings: &WebSearchSettings, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            search_depth: settings.search_depth.clone(),
            max_results: settings.max_results.max(1),
        })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    #[instrument(skip(self), fields(query = %query))]
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<WebResult>> {
        let max_results = max_results.clamp(1, self.max_results);
        let response = self
            .client
            .post(format!("{}/search", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "query": query,
                "max_results": max_results,
                "search_depth": self.search_depth,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FinragError::WebSearch(format!("{}: {}", status, body)));
        }

        let parsed: TavilyResponse = response.json().await?;
        let mut results = parsed.results;
        results.truncate(max_results as usize);

        debug!("Web search returned {} results", results.len());
        Ok(results)
    }
}

/// Render results as a numbered list for the model.
pub fn format_results(results: &[WebResult]) -> String {
    if results.is_empty() {
        return "No web results found.".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, r.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    async fn fake_tavily(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer tvly-test");
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "bad key" })));
        }
        assert_eq!(body["search_depth"], "basic");
        (
            StatusCode::OK,
            Json(json!({
                "query": body["query"],
                "results": [
                    { "title": "Bajaj Finserv share price", "url": "https://example.com/a", "content": "Up 2%", "score": 0.9 },
                    { "title": "Quarterly results", "url": "https://example.com/b", "content": "PAT rose", "score": 0.8 }
                ]
            })),
        )
    }

    async fn serve() -> String {
        let app = Router::new().route("/search", post(fake_tavily));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn settings(api_base: String) -> WebSearchSettings {
        WebSearchSettings {
            api_base,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_search_parses_and_truncates() {
        let base = serve().await;
        let search = TavilySearch::new(&settings(base), "tvly-test").unwrap();
        let results = search.search("bajaj finserv", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_configured_cap_wins_over_request() {
        let base = serve().await;
        let capped = WebSearchSettings {
            max_results: 1,
            ..settings(base)
        };
        let search = TavilySearch::new(&capped, "tvly-test").unwrap();
        assert_eq!(search.search("bajaj finserv", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let base = serve().await;
        let search = TavilySearch::new(&settings(base), "wrong").unwrap();
        let err = search.search("q", 5).await.unwrap_err();
        assert!(matches!(err, FinragError::WebSearch(msg) if msg.contains("bad key")));
    }

    #[test]
    fn test_format_results() {
        assert_eq!(format_results(&[]), "No web results found.");
        let text = format_results(&[WebResult {
            title: "T".into(),
            url: "https://u".into(),
            content: " body ".into(),
            score: 1.0,
        }]);
        assert_eq!(text, "1. T\n   https://u\n   body");
    }
}
